// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::domain::models::style::StyleSource;

/// 风格来源模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleMode {
    /// 竞品参考图
    Reference,
    /// 预设模板
    Template,
}

/// 风格来源请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_style_source"))]
pub struct StyleSourceDto {
    pub mode: StyleMode,
    pub reference_image_key: Option<String>,
    #[serde(default)]
    pub extracted_text: Vec<String>,
    pub template_id: Option<String>,
    pub scene_type: Option<String>,
    pub scene_description: Option<String>,
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn validate_style_source(dto: &StyleSourceDto) -> Result<(), ValidationError> {
    let valid = match dto.mode {
        StyleMode::Reference => non_blank(&dto.reference_image_key),
        StyleMode::Template => non_blank(&dto.template_id),
    };
    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("style_source");
        error.message = Some(match dto.mode {
            StyleMode::Reference => "reference mode requires reference_image_key".into(),
            StyleMode::Template => "template mode requires template_id".into(),
        });
        Err(error)
    }
}

impl StyleSourceDto {
    /// 转换为领域模型，调用前应先通过校验
    pub fn into_style_source(self) -> StyleSource {
        match self.mode {
            StyleMode::Reference => StyleSource::Reference {
                image_key: self.reference_image_key.unwrap_or_default(),
                extracted_text: self.extracted_text,
            },
            StyleMode::Template => {
                let template_id = self.template_id.unwrap_or_default();
                StyleSource::Template {
                    scene_type: self.scene_type.unwrap_or_else(|| template_id.clone()),
                    scene_description: self.scene_description.unwrap_or_default(),
                    template_id,
                }
            }
        }
    }
}

/// 单任务提交请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateTaskRequestDto {
    #[validate(length(min = 1, max = 512))]
    pub product_image_key: String,
    #[validate(nested)]
    pub style: StyleSourceDto,
    pub model_selector: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
}
