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
        dto::batch_request::CreateBatchRequestDto,
        use_cases::generation_use_case::GenerationUseCase,
    },
    presentation::errors::AppError,
};

/// 提交批量任务
pub async fn create_batch(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Json(payload): Json<CreateBatchRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    let view = use_case.submit_batch(payload).await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// 查询批次与子任务
pub async fn get_batch(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Path(batch_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = use_case.get_batch(batch_id).await?;
    Ok(Json(view))
}

/// 重试批次中失败的子任务
pub async fn retry_batch(
    Extension(use_case): Extension<Arc<GenerationUseCase>>,
    Path(batch_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let batch = use_case.retry_batch(batch_id).await?;
    Ok((StatusCode::ACCEPTED, Json(batch)))
}
