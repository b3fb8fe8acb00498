// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 参考图风格分析结果
///
/// 第 1 步的产出。批次模式下由批次计算一次，所有子任务只读共享。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleAnalysis {
    /// 构图描述
    #[serde(default)]
    pub composition: String,
    /// 主色调
    #[serde(default)]
    pub color_palette: Vec<String>,
    /// 光线
    #[serde(default)]
    pub lighting: String,
    /// 背景/场景
    #[serde(default)]
    pub background: String,
    /// 文案排版风格
    #[serde(default)]
    pub typography: Option<String>,
    /// 整体氛围
    #[serde(default)]
    pub mood: String,
    /// 参考图中识别出的文字
    #[serde(default)]
    pub extracted_text: Vec<String>,
}

impl StyleAnalysis {
    /// 由预设模板直接构造风格描述，不调用外部模型
    pub fn from_template(scene_type: &str, scene_description: &str) -> Self {
        Self {
            composition: scene_type.to_string(),
            background: scene_description.to_string(),
            mood: scene_type.to_string(),
            ..Default::default()
        }
    }
}

/// 商品图内容分析结果（第 2 步产出）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentAnalysis {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub selling_points: Vec<String>,
}
