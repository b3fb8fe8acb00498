// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    application::{
        dto::task_request::CreateTaskRequestDto,
        use_cases::generation_use_case::GenerationUseCase,
    },
    presentation::errors::AppError,
};

/// 提交单个生成任务
pub async fn create_task(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Json(payload): Json<CreateTaskRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    let task = use_case.submit_task(payload).await?;
    Ok((StatusCode::ACCEPTED, Json(task)))
}

/// 查询任务状态与各步产出
pub async fn get_task(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let task = use_case.get_task(task_id).await?;
    Ok(Json(task))
}

/// 查询任务费用明细
pub async fn get_task_costs(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let costs = use_case.get_task_costs(task_id).await?;
    Ok(Json(costs))
}

/// 从失败的步骤重试任务
pub async fn retry_task(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let task = use_case.retry_task(task_id).await?;
    Ok((StatusCode::ACCEPTED, Json(task)))
}
