// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use styleforge::domain::models::analysis::{ContentAnalysis, StyleAnalysis};
use styleforge::domain::models::cost::{CostMetrics, CurrencyClass};
use styleforge::domain::models::task::Stage;
use styleforge::domain::services::collaborators::{
    CallCost, ContentAnalyzer, CostLookup, GeneratedImage, GenerationRequest, ImageGenerator,
    ImagePayload, PromptRequest, PromptSynthesizer, ProviderCall, ProviderError, StyleAnalyzer,
};
use uuid::Uuid;

pub const METERED_PER_CALL: Decimal = dec!(0.01);
pub const FIXED_PER_IMAGE: Decimal = dec!(0.2);

/// 可编程的假供应商
///
/// 测试图片的内容就是它的存储键，所以可以按商品图键注入失败。
#[derive(Default)]
pub struct FakeProviders {
    pub style_calls: AtomicUsize,
    pub content_calls: AtomicUsize,
    pub prompt_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    failures: Mutex<HashMap<(String, Stage), usize>>,
    prompts: Mutex<HashMap<String, usize>>,
    lookup_fails: Mutex<bool>,
}

impl FakeProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让 `key` 对应的图片在 `stage` 失败 `times` 次
    pub fn fail(&self, key: &str, stage: Stage, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert((key.to_string(), stage), times);
    }

    pub fn fail_lookups(&self) {
        *self.lock_lookup() = true;
    }

    /// 内容分析调用时停留的时长，用于观察并发
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// 指定商品图经过了几次提示词合成
    pub fn prompt_calls_for(&self, key: &str) -> usize {
        self.prompts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.style_calls.load(Ordering::SeqCst)
            + self.content_calls.load(Ordering::SeqCst)
            + self.prompt_calls.load(Ordering::SeqCst)
            + self.image_calls.load(Ordering::SeqCst)
    }

    fn lock_lookup(&self) -> std::sync::MutexGuard<'_, bool> {
        self.lookup_fails.lock().unwrap()
    }

    fn should_fail(&self, key: &str, stage: Stage) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&(key.to_string(), stage)) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn check(&self, key: &str, stage: Stage) -> Result<(), ProviderError> {
        if self.should_fail(key, stage) {
            Err(ProviderError::InvalidResponse(format!(
                "injected failure for {} at {}",
                key, stage
            )))
        } else {
            Ok(())
        }
    }

    fn call<T>(output: T, model: &str) -> ProviderCall<T> {
        ProviderCall {
            output,
            call_id: format!("gen-{}", Uuid::new_v4()),
            model: model.to_string(),
        }
    }
}

fn key_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[async_trait]
impl StyleAnalyzer for FakeProviders {
    async fn analyze_style(
        &self,
        reference_image: &[u8],
        extracted_text: &[String],
    ) -> Result<ProviderCall<StyleAnalysis>, ProviderError> {
        self.style_calls.fetch_add(1, Ordering::SeqCst);
        let key = key_of(reference_image);
        self.check(&key, Stage::StyleAnalysis)?;
        Ok(Self::call(
            StyleAnalysis {
                composition: format!("like {}", key),
                mood: "bright".into(),
                extracted_text: extracted_text.to_vec(),
                ..Default::default()
            },
            "vision-style",
        ))
    }
}

#[async_trait]
impl ContentAnalyzer for FakeProviders {
    async fn analyze_content(
        &self,
        product_image: &[u8],
    ) -> Result<ProviderCall<ContentAnalysis>, ProviderError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = key_of(product_image);
        self.check(&key, Stage::ContentAnalysis)?;
        Ok(Self::call(
            ContentAnalysis {
                product_name: key,
                category: "kitchenware".into(),
                ..Default::default()
            },
            "vision-content",
        ))
    }
}

#[async_trait]
impl PromptSynthesizer for FakeProviders {
    async fn synthesize(
        &self,
        request: PromptRequest<'_>,
    ) -> Result<ProviderCall<String>, ProviderError> {
        self.prompt_calls.fetch_add(1, Ordering::SeqCst);
        let key = request.content.product_name.clone();
        *self.prompts.lock().unwrap().entry(key.clone()).or_default() += 1;
        self.check(&key, Stage::PromptSynthesis)?;
        Ok(Self::call(
            format!("{} in a {} scene", key, request.style.mood),
            "vision-prompt",
        ))
    }
}

#[async_trait]
impl ImageGenerator for FakeProviders {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedImage, ProviderError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let key = key_of(request.product_image);
        self.check(&key, Stage::ImageGeneration)?;
        Ok(GeneratedImage {
            image: ImagePayload::Bytes(format!("rendered {}", key).into_bytes()),
            call_id: format!("img-{}", Uuid::new_v4()),
            model: "image-model".into(),
            fixed_cost: Some(FIXED_PER_IMAGE),
        })
    }
}

#[async_trait]
impl CostLookup for FakeProviders {
    async fn lookup(&self, _call_id: &str) -> Result<CallCost, ProviderError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if *self.lock_lookup() {
            return Err(ProviderError::Http("404 Not Found".into()));
        }
        Ok(CallCost {
            amount: METERED_PER_CALL,
            currency: CurrencyClass::Metered,
            metrics: CostMetrics {
                prompt_tokens: Some(100),
                completion_tokens: Some(20),
                latency_ms: Some(5),
            },
        })
    }
}
