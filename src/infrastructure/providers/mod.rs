// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 模型供应商适配器
//!
//! 通用的 OpenAI 兼容 HTTP 接口：对话/视觉模型负责风格分析、内容分析和
//! 提示词合成，生图接口负责第 4 步，费用查询接口按调用 ID 返回计量费用。

pub mod chat_vision;
pub mod cost_lookup;
pub mod image_generator;
pub mod token_cache;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{RequestBuilder, Response};
use std::sync::Arc;

use crate::domain::services::collaborators::ProviderError;
use token_cache::AccessTokenCache;

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Http(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

/// 接口鉴权方式
#[derive(Clone)]
pub enum ApiAuth {
    /// 不鉴权
    None,
    /// 固定 API 密钥
    Static(String),
    /// 通过令牌缓存获取的临时访问令牌
    Token(Arc<AccessTokenCache>),
}

impl ApiAuth {
    /// 根据配置选择鉴权方式，配置了 `token_url` 时优先使用临时令牌
    pub fn from_config(
        client: reqwest::Client,
        api_key: Option<String>,
        token_url: Option<String>,
    ) -> Self {
        match (api_key, token_url) {
            (Some(key), Some(url)) => ApiAuth::Token(Arc::new(AccessTokenCache::new(client, url, key))),
            (Some(key), None) => ApiAuth::Static(key),
            (None, _) => ApiAuth::None,
        }
    }

    pub async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        match self {
            ApiAuth::None => Ok(request),
            ApiAuth::Static(key) => Ok(request.bearer_auth(key)),
            ApiAuth::Token(cache) => Ok(request.bearer_auth(cache.token().await?)),
        }
    }
}

/// 非 2xx 响应转为错误，错误文本带上状态行以便判断是否可重试
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(512).collect();
    Err(ProviderError::Http(format!("{} {}", status, body)))
}

/// 根据文件头推断图片 MIME 类型
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

/// 图片字节编码为 data URL
pub fn data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), STANDARD.encode(bytes))
}
