// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::models::analysis::{ContentAnalysis, StyleAnalysis};
use crate::domain::models::cost::{CostMetrics, CurrencyClass};
use crate::domain::repositories::storage_repository::ImageStore;

/// 外部模型调用错误
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("timeout after {0}s")]
    Timeout(u64),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// 网络抖动、超时、5xx、限流可以重试，其余直接失败
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) => true,
            ProviderError::Http(message) => {
                crate::utils::retry_policy::is_retryable_message(message)
            }
            ProviderError::InvalidResponse(_) | ProviderError::NotConfigured(_) => false,
        }
    }
}

/// 一次外部调用的结果：产出、供应商调用 ID、实际服务的模型
#[derive(Debug, Clone)]
pub struct ProviderCall<T> {
    pub output: T,
    pub call_id: String,
    pub model: String,
}

/// 提示词合成的输入
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub style: &'a StyleAnalysis,
    pub content: &'a ContentAnalysis,
    pub user_metadata: Option<&'a serde_json::Value>,
    /// 模板模式下的 `(scene_type, scene_description)`
    pub scene: Option<(&'a str, &'a str)>,
}

/// 生图的输入
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub product_image: &'a [u8],
    pub prompt: &'a str,
    pub style_reference: Option<&'a [u8]>,
    pub model_selector: &'a str,
}

/// 生图结果：原始字节或供应商托管的 URL
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: ImagePayload,
    pub call_id: String,
    pub model: String,
    /// 固定价供应商在调用时直接给出费用（CNY）
    pub fixed_cost: Option<Decimal>,
}

/// 计量型供应商的费用查询结果
#[derive(Debug, Clone, PartialEq)]
pub struct CallCost {
    pub amount: Decimal,
    pub currency: CurrencyClass,
    pub metrics: CostMetrics,
}

/// 参考图风格分析
#[async_trait]
pub trait StyleAnalyzer: Send + Sync {
    async fn analyze_style(
        &self,
        reference_image: &[u8],
        extracted_text: &[String],
    ) -> Result<ProviderCall<StyleAnalysis>, ProviderError>;
}

/// 商品图内容分析
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze_content(
        &self,
        product_image: &[u8],
    ) -> Result<ProviderCall<ContentAnalysis>, ProviderError>;
}

/// 提示词合成
#[async_trait]
pub trait PromptSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        request: PromptRequest<'_>,
    ) -> Result<ProviderCall<String>, ProviderError>;
}

/// 图片生成
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedImage, ProviderError>;
}

/// 按调用 ID 查询计量费用
#[async_trait]
pub trait CostLookup: Send + Sync {
    async fn lookup(&self, call_id: &str) -> Result<CallCost, ProviderError>;
}

/// 流水线用到的全部外部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub style_analyzer: Arc<dyn StyleAnalyzer>,
    pub content_analyzer: Arc<dyn ContentAnalyzer>,
    pub prompt_synthesizer: Arc<dyn PromptSynthesizer>,
    pub image_generator: Arc<dyn ImageGenerator>,
    pub cost_lookup: Arc<dyn CostLookup>,
    pub images: Arc<dyn ImageStore>,
}
