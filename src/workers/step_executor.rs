// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::analysis::{ContentAnalysis, StyleAnalysis};
use crate::domain::models::cost::{CostMetrics, CurrencyClass};
use crate::domain::models::style::StyleSource;
use crate::domain::models::task::{GenerationTask, Stage};
use crate::domain::repositories::storage_repository::StorageError;
use crate::domain::services::collaborators::{
    Collaborators, GenerationRequest, ImagePayload, PromptRequest, ProviderError,
};
use crate::domain::services::cost_ledger::CostLedger;
use crate::utils::retry_policy::RetryPolicy;
use rust_decimal::Decimal;

/// 预设模板模式下第 1 步的“模型”名
pub const TEMPLATE_MODEL: &str = "preset-template";

/// 单个阶段的执行错误
#[derive(Error, Debug)]
pub enum StageError {
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Storage(#[from] StorageError),
    /// 前一阶段产出不可用
    #[error("missing input: output of {0} is not available")]
    MissingInput(Stage),
}

/// 一次调用产生的费用
#[derive(Debug, Clone, PartialEq)]
pub enum Charge {
    /// 不产生费用（预设模板）
    None,
    /// 计量计费，需要按调用 ID 查询
    Metered { call_id: String },
    /// 固定价，调用时已给出
    Fixed { call_id: String, amount: Decimal },
}

/// 阶段产出，附带服务该阶段的模型和费用
#[derive(Debug, Clone)]
pub struct StageResult<T> {
    pub output: T,
    pub model: String,
    pub charge: Charge,
}

/// 步骤执行器
///
/// 每个阶段一个方法：读取前序产出，调用外部协作方，返回本阶段产出。
/// 持久化和状态推进由 [`super::task_runner::TaskRunner`] 负责。
pub struct StepExecutor {
    collaborators: Collaborators,
    ledger: Arc<CostLedger>,
    retry: RetryPolicy,
}

impl StepExecutor {
    pub fn new(collaborators: Collaborators, ledger: Arc<CostLedger>, retry: RetryPolicy) -> Self {
        Self {
            collaborators,
            ledger,
            retry,
        }
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// 第 1 步：参考图风格分析，模板模式直接由场景生成
    pub async fn analyze_style(
        &self,
        source: &StyleSource,
    ) -> Result<StageResult<StyleAnalysis>, StageError> {
        match source {
            StyleSource::Reference {
                image_key,
                extracted_text,
            } => {
                let reference = self.collaborators.images.load_image(image_key).await?;
                let analyzer = &self.collaborators.style_analyzer;
                let call = self
                    .retry
                    .call("style_analysis", || {
                        analyzer.analyze_style(&reference, extracted_text)
                    })
                    .await?;
                Ok(StageResult {
                    output: call.output,
                    model: call.model,
                    charge: Charge::Metered {
                        call_id: call.call_id,
                    },
                })
            }
            StyleSource::Template {
                scene_type,
                scene_description,
                ..
            } => Ok(StageResult {
                output: StyleAnalysis::from_template(scene_type, scene_description),
                model: TEMPLATE_MODEL.to_string(),
                charge: Charge::None,
            }),
        }
    }

    /// 第 2 步：商品图内容分析
    pub async fn analyze_content(
        &self,
        task: &GenerationTask,
    ) -> Result<StageResult<ContentAnalysis>, StageError> {
        let product = self
            .collaborators
            .images
            .load_image(&task.product_image_key)
            .await?;
        let analyzer = &self.collaborators.content_analyzer;
        let call = self
            .retry
            .call("content_analysis", || analyzer.analyze_content(&product))
            .await?;
        Ok(StageResult {
            output: call.output,
            model: call.model,
            charge: Charge::Metered {
                call_id: call.call_id,
            },
        })
    }

    /// 第 3 步：合成生图提示词
    pub async fn synthesize_prompt(
        &self,
        task: &GenerationTask,
        style: &StyleAnalysis,
    ) -> Result<StageResult<String>, StageError> {
        let content = task
            .content_analysis
            .as_ref()
            .ok_or(StageError::MissingInput(Stage::ContentAnalysis))?;
        let request = PromptRequest {
            style,
            content,
            user_metadata: task.user_metadata.as_ref(),
            scene: task.style_source.scene(),
        };
        let synthesizer = &self.collaborators.prompt_synthesizer;
        let call = self
            .retry
            .call("prompt_synthesis", || synthesizer.synthesize(request))
            .await?;
        Ok(StageResult {
            output: call.output,
            model: call.model,
            charge: Charge::Metered {
                call_id: call.call_id,
            },
        })
    }

    /// 第 4 步：生成图片并保存
    ///
    /// 返回的产出是结果图的存储键或供应商 URL。
    pub async fn generate_image(
        &self,
        task: &GenerationTask,
    ) -> Result<StageResult<Vec<String>>, StageError> {
        let prompt = task
            .generated_prompt
            .as_deref()
            .ok_or(StageError::MissingInput(Stage::PromptSynthesis))?;
        let images = &self.collaborators.images;
        let product = images.load_image(&task.product_image_key).await?;
        let reference = match task.style_source.reference_image_key() {
            Some(key) => Some(images.load_image(key).await?),
            None => None,
        };

        let request = GenerationRequest {
            product_image: &product,
            prompt,
            style_reference: reference.as_deref(),
            model_selector: &task.model_selector,
        };
        let generator = &self.collaborators.image_generator;
        let generated = self
            .retry
            .call("image_generation", || generator.generate(request))
            .await?;

        let location = match generated.image {
            ImagePayload::Bytes(bytes) => {
                let key = format!("results/{}/{}.png", task.id, Uuid::new_v4());
                images.put_image(&key, &bytes).await?;
                key
            }
            ImagePayload::Url(url) => url,
        };

        let charge = match generated.fixed_cost {
            Some(amount) => Charge::Fixed {
                call_id: generated.call_id,
                amount,
            },
            None => Charge::Metered {
                call_id: generated.call_id,
            },
        };

        Ok(StageResult {
            output: vec![location],
            model: generated.model,
            charge,
        })
    }

    /// 结算一次调用的费用
    ///
    /// 费用记录失败只记日志和计数，不影响阶段结果。
    pub async fn settle_cost(&self, task_id: Uuid, stage: Stage, charge: &Charge) {
        let result = match charge {
            Charge::None => return,
            Charge::Metered { call_id } => {
                let lookup = &self.collaborators.cost_lookup;
                match self.retry.call("cost_lookup", || lookup.lookup(call_id)).await {
                    Ok(cost) => self
                        .ledger
                        .record(task_id, stage, call_id, cost.amount, cost.currency, cost.metrics)
                        .await
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
            Charge::Fixed { call_id, amount } => self
                .ledger
                .record(
                    task_id,
                    stage,
                    call_id,
                    *amount,
                    CurrencyClass::Fixed,
                    CostMetrics::default(),
                )
                .await
                .map_err(|e| e.to_string()),
        };

        match result {
            Ok(_) => debug!(task_id = %task_id, stage = stage.number(), "Cost settled"),
            Err(error) => {
                warn!(
                    task_id = %task_id,
                    stage = stage.number(),
                    error = %error,
                    "Failed to record cost, continuing"
                );
                metrics::counter!("cost_record_failures_total").increment(1);
            }
        }
    }
}
