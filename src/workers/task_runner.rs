// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::step_executor::{Charge, StageError, StepExecutor};
use crate::domain::models::analysis::StyleAnalysis;
use crate::domain::models::task::{GenerationTask, ModelTrace, Stage, TaskStatus};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::utils::errors::PipelineError;

/// 批次提供的第 1 步产出
struct SharedStyle {
    analysis: StyleAnalysis,
    model: Option<String>,
}

/// 任务状态机
///
/// 按顺序执行 `start..=4` 各阶段。每个阶段先写入状态和 current_step，
/// 执行后先持久化产出再结算费用，然后进入下一阶段。任一阶段出错即停止，
/// 任务转为 Failed 并记录失败阶段与原因。
pub struct TaskRunner {
    tasks: Arc<dyn TaskRepository>,
    batches: Arc<dyn BatchRepository>,
    executor: Arc<StepExecutor>,
}

impl TaskRunner {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        batches: Arc<dyn BatchRepository>,
        executor: Arc<StepExecutor>,
    ) -> Self {
        Self {
            tasks,
            batches,
            executor,
        }
    }

    /// 从 `start` 开始执行任务
    ///
    /// `start` 之前各阶段的产出必须都已持久化，否则返回
    /// [`PipelineError::CannotResume`]，且不会发起任何外部调用。
    /// 批次参考图模式的子任务不会执行第 1 步，起始阶段至少为第 2 步。
    #[instrument(skip_all, fields(task_id = %task_id, start = %start))]
    pub async fn run(&self, task_id: Uuid, start: Stage) -> Result<GenerationTask, PipelineError> {
        let mut task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(PipelineError::TaskNotFound(task_id))?;

        let shared = self.shared_style(&task).await?;
        let start = start.max(task.min_start_stage());

        if let Some(missing) = task.first_missing_before(start, shared.is_some()) {
            error!(missing = %missing, "Cannot resume task, predecessor output missing");
            return Err(PipelineError::CannotResume {
                task_id,
                requested: start,
                missing,
            });
        }

        task.begin_resume();
        let mut trace = task.model_trace.clone().unwrap_or_default();
        if let Some(model) = shared.as_ref().and_then(|s| s.model.as_deref()) {
            trace.record(Stage::StyleAnalysis, model);
        }

        info!("Running task");

        for stage in start.through_last() {
            task.enter_stage(stage);
            task = self.tasks.update(&task).await?;

            let started = Instant::now();
            let outcome = self
                .execute_stage(&mut task, stage, shared.as_ref().map(|s| &s.analysis))
                .await;
            metrics::histogram!("stage_duration_seconds", "stage" => stage.name())
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok((model, charge)) => {
                    trace.record(stage, model);
                    task.model_trace = Some(trace.clone());
                    task = self.tasks.update(&task).await?;
                    self.executor.settle_cost(task.id, stage, &charge).await;
                }
                Err(err) => {
                    let message = err.to_string();
                    error!(stage = %stage, error = %message, "Stage failed");
                    metrics::counter!("stage_failures_total", "stage" => stage.name())
                        .increment(1);

                    task.fail_at(stage, message.clone());
                    self.tasks.update(&task).await?;
                    return Err(PipelineError::StageFailed { stage, message });
                }
            }
        }

        task.complete(trace)?;
        let task = self.tasks.update(&task).await?;
        info!("Task completed");
        Ok(task)
    }

    /// 从记录的失败阶段恢复一个失败任务
    ///
    /// 没有记录失败阶段时从该任务允许的最小阶段开始。
    pub async fn resume(&self, task_id: Uuid) -> Result<GenerationTask, PipelineError> {
        let task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(PipelineError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::Failed {
            return Err(PipelineError::NotRetryable(task_id));
        }

        let start = task.resume_stage(task.min_start_stage());
        self.run(task_id, start).await
    }

    /// 执行单个阶段并把产出写到任务上（尚未持久化）
    async fn execute_stage(
        &self,
        task: &mut GenerationTask,
        stage: Stage,
        shared: Option<&StyleAnalysis>,
    ) -> Result<(String, Charge), StageError> {
        match stage {
            Stage::StyleAnalysis => {
                let result = self.executor.analyze_style(&task.style_source).await?;
                task.style_analysis = Some(result.output);
                Ok((result.model, result.charge))
            }
            Stage::ContentAnalysis => {
                let result = self.executor.analyze_content(task).await?;
                task.content_analysis = Some(result.output);
                Ok((result.model, result.charge))
            }
            Stage::PromptSynthesis => {
                let style = shared
                    .or(task.style_analysis.as_ref())
                    .ok_or(StageError::MissingInput(Stage::StyleAnalysis))?;
                let result = self.executor.synthesize_prompt(task, style).await?;
                task.generated_prompt = Some(result.output);
                Ok((result.model, result.charge))
            }
            Stage::ImageGeneration => {
                let result = self.executor.generate_image(task).await?;
                task.result_images = result.output;
                Ok((result.model, result.charge))
            }
        }
    }

    /// 批次参考图模式下读取批次上的共享分析
    async fn shared_style(
        &self,
        task: &GenerationTask,
    ) -> Result<Option<SharedStyle>, PipelineError> {
        let batch_id = match task.batch_id {
            Some(batch_id) if task.uses_shared_analysis() => batch_id,
            _ => return Ok(None),
        };

        let batch = self
            .batches
            .find_by_id(batch_id)
            .await?
            .ok_or(PipelineError::BatchNotFound(batch_id))?;

        Ok(batch.shared_analysis.map(|analysis| SharedStyle {
            analysis,
            model: batch.shared_analysis_model,
        }))
    }
}
