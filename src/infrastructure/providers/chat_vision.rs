// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{data_url, ensure_success, ApiAuth};
use crate::domain::models::analysis::{ContentAnalysis, StyleAnalysis};
use crate::domain::services::collaborators::{
    ContentAnalyzer, PromptRequest, PromptSynthesizer, ProviderCall, ProviderError, StyleAnalyzer,
};

const STYLE_INSTRUCTION: &str = "Describe the visual style of this marketing image. \
Answer with a JSON object with keys: composition, color_palette (array), lighting, \
background, typography, mood, extracted_text (array).";

const CONTENT_INSTRUCTION: &str = "Describe the product in this photo. \
Answer with a JSON object with keys: product_name, category, key_features (array), \
colors (array), materials (array), selling_points (array).";

const PROMPT_INSTRUCTION: &str = "Write one image-generation prompt that places the \
product in a scene matching the style. Answer with the prompt text only.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    id: String,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 兼容的对话/视觉模型客户端
///
/// 同时承担风格分析、内容分析和提示词合成三个协作方角色。
pub struct ChatVisionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    auth: ApiAuth,
}

impl ChatVisionClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        auth: ApiAuth,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            auth,
        }
    }

    /// 发送一次对话请求，返回文本回答
    async fn chat(&self, content: Value, json_mode: bool) -> Result<ProviderCall<String>, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        let response = self.auth.apply(request).await?.send().await?;
        let parsed: ChatResponse = ensure_success(response).await?.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty completion".to_string()))?;

        debug!(call_id = %parsed.id, "Chat completion received");
        Ok(ProviderCall {
            output: text,
            call_id: parsed.id,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn chat_json<T: DeserializeOwned>(
        &self,
        content: Value,
    ) -> Result<ProviderCall<T>, ProviderError> {
        let call = self.chat(content, true).await?;
        let output = parse_json_answer(&call.output)?;
        Ok(ProviderCall {
            output,
            call_id: call.call_id,
            model: call.model,
        })
    }
}

/// 解析模型回答中的 JSON，容忍 Markdown 代码块包裹
pub fn parse_json_answer<T: DeserializeOwned>(answer: &str) -> Result<T, ProviderError> {
    let trimmed = answer.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
        .map_err(|e| ProviderError::InvalidResponse(format!("unparseable analysis: {}", e)))
}

fn image_part(bytes: &[u8]) -> Value {
    json!({ "type": "image_url", "image_url": { "url": data_url(bytes) } })
}

fn text_part(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

#[async_trait]
impl StyleAnalyzer for ChatVisionClient {
    async fn analyze_style(
        &self,
        reference_image: &[u8],
        extracted_text: &[String],
    ) -> Result<ProviderCall<StyleAnalysis>, ProviderError> {
        let mut instruction = STYLE_INSTRUCTION.to_string();
        if !extracted_text.is_empty() {
            instruction.push_str("\nText already recognised in the image: ");
            instruction.push_str(&extracted_text.join(" | "));
        }

        let mut call: ProviderCall<StyleAnalysis> = self
            .chat_json(json!([text_part(&instruction), image_part(reference_image)]))
            .await?;
        if call.output.extracted_text.is_empty() {
            call.output.extracted_text = extracted_text.to_vec();
        }
        Ok(call)
    }
}

#[async_trait]
impl ContentAnalyzer for ChatVisionClient {
    async fn analyze_content(
        &self,
        product_image: &[u8],
    ) -> Result<ProviderCall<ContentAnalysis>, ProviderError> {
        self.chat_json(json!([text_part(CONTENT_INSTRUCTION), image_part(product_image)]))
            .await
    }
}

#[async_trait]
impl PromptSynthesizer for ChatVisionClient {
    async fn synthesize(
        &self,
        request: PromptRequest<'_>,
    ) -> Result<ProviderCall<String>, ProviderError> {
        let style = serde_json::to_string(request.style)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let content = serde_json::to_string(request.content)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let mut text = format!("{}\nStyle: {}\nProduct: {}", PROMPT_INSTRUCTION, style, content);
        if let Some((scene_type, scene_description)) = request.scene {
            text.push_str(&format!("\nScene: {} - {}", scene_type, scene_description));
        }
        if let Some(metadata) = request.user_metadata {
            text.push_str(&format!("\nSeller notes: {}", metadata));
        }

        let mut call = self.chat(json!(text), false).await?;
        call.output = call.output.trim().to_string();
        Ok(call)
    }
}
