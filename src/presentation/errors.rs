// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::application::use_cases::generation_use_case::UseCaseError;

/// 应用错误类型
///
/// 把用例错误映射为 HTTP 状态码和 `{"error": ...}` 响应体
#[derive(Debug)]
pub struct AppError(UseCaseError);

impl From<UseCaseError> for (StatusCode, String) {
    fn from(err: UseCaseError) -> Self {
        let status = match &err {
            UseCaseError::Validation(_) => StatusCode::BAD_REQUEST,
            UseCaseError::TaskNotFound(_) | UseCaseError::BatchNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            UseCaseError::NotRetryable(_)
            | UseCaseError::CannotResume { .. }
            | UseCaseError::Domain(_) => StatusCode::CONFLICT,
            UseCaseError::Repository(_) | UseCaseError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message): (StatusCode, String) = self.0.into();
        if status.is_server_error() {
            error!(error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<UseCaseError> for AppError {
    fn from(err: UseCaseError) -> Self {
        Self(err)
    }
}
