// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{data_url, ensure_success, ApiAuth};
use crate::domain::models::task::DEFAULT_MODEL_SELECTOR;
use crate::domain::services::collaborators::{
    GeneratedImage, GenerationRequest, ImageGenerator, ImagePayload, ProviderError,
};

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    id: Option<String>,
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// OpenAI 兼容的生图客户端
///
/// 配置了按张固定价时，结果里直接带上费用；否则由计量费用查询补记。
pub struct HttpImageGenerator {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    auth: ApiAuth,
    fixed_price: Option<Decimal>,
}

impl HttpImageGenerator {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        auth: ApiAuth,
        fixed_price: Option<Decimal>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            auth,
            fixed_price,
        }
    }

    fn resolve_model(&self, selector: &str) -> String {
        if selector.is_empty() || selector == DEFAULT_MODEL_SELECTOR {
            self.default_model.clone()
        } else {
            selector.to_string()
        }
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedImage, ProviderError> {
        let model = self.resolve_model(request.model_selector);

        let mut images = vec![data_url(request.product_image)];
        if let Some(reference) = request.style_reference {
            images.push(data_url(reference));
        }

        let body = json!({
            "model": model,
            "prompt": request.prompt,
            "images": images,
            "n": 1,
            "response_format": "b64_json",
        });

        let http_request = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .json(&body);
        let response = ensure_success(self.auth.apply(http_request).await?.send().await?).await?;

        let header_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let parsed: ImagesResponse = response.json().await?;

        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no image returned".to_string()))?;

        let image = match (first.b64_json, first.url) {
            (Some(encoded), _) => ImagePayload::Bytes(
                STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| ProviderError::InvalidResponse(format!("bad base64: {}", e)))?,
            ),
            (None, Some(url)) => ImagePayload::Url(url),
            (None, None) => {
                return Err(ProviderError::InvalidResponse(
                    "image has neither data nor url".to_string(),
                ))
            }
        };

        let call_id = parsed
            .id
            .or(header_id)
            .unwrap_or_else(|| format!("img-{}", Uuid::new_v4()));

        Ok(GeneratedImage {
            image,
            call_id,
            model,
            fixed_cost: self.fixed_price,
        })
    }
}
