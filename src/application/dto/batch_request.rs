// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::task_request::StyleSourceDto;

/// 单个批次最多包含的商品图数量
pub const MAX_BATCH_SIZE: usize = 50;

/// 批量提交请求：多张商品图共用一个风格来源
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBatchRequestDto {
    #[validate(
        length(min = 1, max = 50),
        custom(function = "validate_image_keys")
    )]
    pub product_image_keys: Vec<String>,
    #[validate(nested)]
    pub style: StyleSourceDto,
    pub model_selector: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
}

fn validate_image_keys(keys: &[String]) -> Result<(), ValidationError> {
    if keys.iter().any(|key| key.trim().is_empty()) {
        let mut error = ValidationError::new("product_image_keys");
        error.message = Some("image keys must not be empty".into());
        return Err(error);
    }
    Ok(())
}
