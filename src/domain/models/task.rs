// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::analysis::{ContentAnalysis, StyleAnalysis};
use super::style::StyleSource;

/// 流水线总步数
pub const TOTAL_STEPS: i32 = 4;

/// 未指定时使用的生图模型选择
pub const DEFAULT_MODEL_SELECTOR: &str = "default";

/// 生成任务实体
///
/// 表示一张商品图走完 4 步流水线的全过程：风格分析、内容分析、
/// 提示词合成、图片生成。每一步的产出都会在进入下一步之前持久化，
/// 失败后可以从失败的那一步恢复。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 任务状态
    pub status: TaskStatus,
    /// 当前步骤（0 表示尚未开始，1-4 为各阶段）
    pub current_step: i32,
    /// 总步数，固定为 4
    pub total_steps: i32,
    /// 风格来源（参考图或预设模板）
    pub style_source: StyleSource,
    /// 商品图在存储中的键
    pub product_image_key: String,
    /// 用户附加信息（卖点、文案等），原样交给提示词合成
    pub user_metadata: Option<serde_json::Value>,
    /// 生图模型选择
    pub model_selector: String,
    /// 第 1 步产出。批次参考图模式下为空，由批次的共享分析代替
    pub style_analysis: Option<StyleAnalysis>,
    /// 第 2 步产出
    pub content_analysis: Option<ContentAnalysis>,
    /// 第 3 步产出
    pub generated_prompt: Option<String>,
    /// 第 4 步产出：结果图的存储键或 URL
    pub result_images: Vec<String>,
    /// 失败的步骤
    pub failed_step: Option<i32>,
    /// 失败原因
    pub error_message: Option<String>,
    /// 每一步实际使用的模型
    pub model_trace: Option<ModelTrace>,
    /// 所属批次
    pub batch_id: Option<Uuid>,
    /// 批次内序号
    pub batch_index: Option<i32>,
    /// 按计费类型汇总的费用，由费用账本从明细重新计算
    pub total_cost: TaskCost,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StyleAnalysis,
    ContentAnalysis,
    PromptSynthesis,
    ImageGeneration,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::StyleAnalysis,
        Stage::ContentAnalysis,
        Stage::PromptSynthesis,
        Stage::ImageGeneration,
    ];

    /// 阶段编号（1-4）
    pub fn number(self) -> i32 {
        match self {
            Stage::StyleAnalysis => 1,
            Stage::ContentAnalysis => 2,
            Stage::PromptSynthesis => 3,
            Stage::ImageGeneration => 4,
        }
    }

    pub fn from_number(number: i32) -> Option<Self> {
        match number {
            1 => Some(Stage::StyleAnalysis),
            2 => Some(Stage::ContentAnalysis),
            3 => Some(Stage::PromptSynthesis),
            4 => Some(Stage::ImageGeneration),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    /// 从 `self` 开始到最后一步（含）的所有阶段
    pub fn through_last(self) -> impl Iterator<Item = Stage> {
        Self::ALL.into_iter().filter(move |s| *s >= self)
    }

    /// 指标标签、日志里使用的名称
    pub fn name(self) -> &'static str {
        match self {
            Stage::StyleAnalysis => "style_analysis",
            Stage::ContentAnalysis => "content_analysis",
            Stage::PromptSynthesis => "prompt_synthesis",
            Stage::ImageGeneration => "image_generation",
        }
    }

    /// 进入该阶段时任务应处的状态
    pub fn running_status(self) -> TaskStatus {
        match self {
            Stage::StyleAnalysis => TaskStatus::AnalyzingReference,
            Stage::ContentAnalysis => TaskStatus::AnalyzingContent,
            Stage::PromptSynthesis => TaskStatus::GeneratingPrompt,
            Stage::ImageGeneration => TaskStatus::GeneratingImage,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.number())
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → AnalyzingReference → AnalyzingContent → GeneratingPrompt
/// → GeneratingImage → Completed，任一进行中状态都可以转为 Failed。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    AnalyzingReference,
    AnalyzingContent,
    GeneratingPrompt,
    GeneratingImage,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::AnalyzingReference => write!(f, "analyzing_reference"),
            TaskStatus::AnalyzingContent => write!(f, "analyzing_content"),
            TaskStatus::GeneratingPrompt => write!(f, "generating_prompt"),
            TaskStatus::GeneratingImage => write!(f, "generating_image"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "analyzing_reference" => Ok(TaskStatus::AnalyzingReference),
            "analyzing_content" => Ok(TaskStatus::AnalyzingContent),
            "generating_prompt" => Ok(TaskStatus::GeneratingPrompt),
            "generating_image" => Ok(TaskStatus::GeneratingImage),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 每一步实际服务的模型，任务完成后附加，便于排查
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTrace {
    pub style_analysis: Option<String>,
    pub content_analysis: Option<String>,
    pub prompt_synthesis: Option<String>,
    pub image_generation: Option<String>,
}

impl ModelTrace {
    pub fn record(&mut self, stage: Stage, model: impl Into<String>) {
        let slot = match stage {
            Stage::StyleAnalysis => &mut self.style_analysis,
            Stage::ContentAnalysis => &mut self.content_analysis,
            Stage::PromptSynthesis => &mut self.prompt_synthesis,
            Stage::ImageGeneration => &mut self.image_generation,
        };
        *slot = Some(model.into());
    }
}

/// 任务费用合计，按计费类型分别累加，不做币种换算
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCost {
    /// 按 token 计费的部分（USD）
    pub metered: Decimal,
    /// 按张计费的部分（CNY）
    pub fixed: Decimal,
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {0}")]
    InvalidStateTransition(TaskStatus),

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl GenerationTask {
    /// 创建一个新的独立任务，状态为 Pending，current_step 为 0
    pub fn new(
        style_source: StyleSource,
        product_image_key: String,
        model_selector: String,
        user_metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            current_step: 0,
            total_steps: TOTAL_STEPS,
            style_source,
            product_image_key,
            user_metadata,
            model_selector,
            style_analysis: None,
            content_analysis: None,
            generated_prompt: None,
            result_images: Vec::new(),
            failed_step: None,
            error_message: None,
            model_trace: None,
            batch_id: None,
            batch_index: None,
            total_cost: TaskCost::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// 挂到批次下
    pub fn in_batch(mut self, batch_id: Uuid, index: i32) -> Self {
        self.batch_id = Some(batch_id);
        self.batch_index = Some(index);
        self
    }

    /// 是否由批次提供第 1 步产出（批次 + 参考图模式）
    pub fn uses_shared_analysis(&self) -> bool {
        self.batch_id.is_some() && self.style_source.needs_shared_analysis()
    }

    /// 该任务允许的最小起始步骤
    pub fn min_start_stage(&self) -> Stage {
        if self.uses_shared_analysis() {
            Stage::ContentAnalysis
        } else {
            Stage::StyleAnalysis
        }
    }

    /// 指定阶段的产出是否已存在
    ///
    /// `shared_available` 表示批次共享分析是否可用，只对第 1 步有意义。
    pub fn has_output(&self, stage: Stage, shared_available: bool) -> bool {
        match stage {
            Stage::StyleAnalysis => {
                if self.uses_shared_analysis() {
                    shared_available
                } else {
                    self.style_analysis.is_some()
                }
            }
            Stage::ContentAnalysis => self.content_analysis.is_some(),
            Stage::PromptSynthesis => self.generated_prompt.is_some(),
            Stage::ImageGeneration => !self.result_images.is_empty(),
        }
    }

    /// 从 `stage` 恢复时，找出第一个缺失产出的前置阶段
    pub fn first_missing_before(&self, stage: Stage, shared_available: bool) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| *s < stage)
            .find(|s| !self.has_output(*s, shared_available))
    }

    /// 从 `floor` 起第一个尚无产出的阶段，全部已有时返回 None
    pub fn next_stage_to_run(&self, floor: Stage, shared_available: bool) -> Option<Stage> {
        floor
            .through_last()
            .find(|s| !self.has_output(*s, shared_available))
    }

    /// 失败后重试的起始步骤：优先使用记录的失败步骤，不低于 `floor`
    pub fn resume_stage(&self, floor: Stage) -> Stage {
        self.failed_step
            .and_then(Stage::from_number)
            .map(|s| s.max(floor))
            .unwrap_or(floor)
    }

    /// 进入某一阶段，状态与 current_step 一起更新
    pub fn enter_stage(&mut self, stage: Stage) {
        self.status = stage.running_status();
        self.current_step = stage.number();
        self.updated_at = Utc::now();
    }

    /// 在某一阶段失败
    pub fn fail_at(&mut self, stage: Stage, message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.failed_step = Some(stage.number());
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    /// 开始一次新的恢复尝试，清除失败信息，已有产出保持不变
    pub fn begin_resume(&mut self) {
        self.failed_step = None;
        self.error_message = None;
        self.completed_at = None;
    }

    /// 重新排队：回到 Pending，等待批次重新驱动
    pub fn requeue(&mut self) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Failed => {
                self.status = TaskStatus::Pending;
                self.begin_resume();
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }

    /// 第 4 步完成后收尾
    pub fn complete(&mut self, trace: ModelTrace) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::GeneratingImage => {
                self.status = TaskStatus::Completed;
                self.current_step = TOTAL_STEPS;
                self.failed_step = None;
                self.error_message = None;
                self.model_trace = Some(trace);
                let now = Utc::now();
                self.updated_at = now;
                self.completed_at = Some(now);
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }
}
