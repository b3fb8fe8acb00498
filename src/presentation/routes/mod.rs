// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::generation_use_case::GenerationUseCase;
use crate::presentation::handlers::{batch_handler, task_handler};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 参数
///
/// * `use_case` - 提交、查询与重试共用的生成用例
pub fn routes(use_case: Arc<GenerationUseCase>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route("/v1/tasks", post(task_handler::create_task))
        .route("/v1/tasks/{id}", get(task_handler::get_task))
        .route("/v1/tasks/{id}/costs", get(task_handler::get_task_costs))
        .route("/v1/tasks/{id}/retry", post(task_handler::retry_task))
        .route("/v1/batches", post(batch_handler::create_batch))
        .route("/v1/batches/{id}", get(batch_handler::get_batch))
        .route("/v1/batches/{id}/retry", post(batch_handler::retry_batch))
        .layer(Extension(use_case));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
