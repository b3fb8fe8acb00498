// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 风格来源
///
/// - `Reference`：竞品/参考图，需要做风格分析（批次内共享一次）
/// - `Template`：预设模板，风格由模板直接给出，每个任务独立跑完 4 步
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StyleSource {
    Reference {
        /// 参考图在存储中的键
        image_key: String,
        /// 上传方预先识别出的文字（可选）
        #[serde(default)]
        extracted_text: Vec<String>,
    },
    Template {
        template_id: String,
        scene_type: String,
        scene_description: String,
    },
}

impl StyleSource {
    /// 是否需要共享的参考图分析
    pub fn needs_shared_analysis(&self) -> bool {
        matches!(self, StyleSource::Reference { .. })
    }

    pub fn reference_image_key(&self) -> Option<&str> {
        match self {
            StyleSource::Reference { image_key, .. } => Some(image_key),
            StyleSource::Template { .. } => None,
        }
    }

    /// 模板模式下的场景信息 `(scene_type, scene_description)`
    pub fn scene(&self) -> Option<(&str, &str)> {
        match self {
            StyleSource::Template {
                scene_type,
                scene_description,
                ..
            } => Some((scene_type, scene_description)),
            StyleSource::Reference { .. } => None,
        }
    }
}
