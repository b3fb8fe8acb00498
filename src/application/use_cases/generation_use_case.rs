// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::batch_request::CreateBatchRequestDto;
use crate::application::dto::task_request::CreateTaskRequestDto;
use crate::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use crate::domain::models::cost::{CostEntry, CostSummary};
use crate::domain::models::task::{
    DomainError, GenerationTask, Stage, TaskStatus, DEFAULT_MODEL_SELECTOR,
};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::domain::services::cost_ledger::CostLedger;
use crate::queue::job_queue::{Job, JobQueue, QueueError};

#[derive(Error, Debug)]
pub enum UseCaseError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("Batch not found: {0}")]
    BatchNotFound(Uuid),
    #[error("Not retryable: {0}")]
    NotRetryable(String),
    #[error("cannot-resume: task {task_id} requested stage {requested} but output of {missing} is missing")]
    CannotResume {
        task_id: Uuid,
        requested: Stage,
        missing: Stage,
    },
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// 批次详情：批次本身加上按序号排列的子任务
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: BatchTask,
    pub children: Vec<GenerationTask>,
}

/// 任务费用明细与汇总
#[derive(Debug, Clone, Serialize)]
pub struct TaskCostView {
    pub task_id: Uuid,
    pub entries: Vec<CostEntry>,
    pub summary: CostSummary,
}

/// 生成用例
///
/// 提交、查询与重试的入口。提交只负责校验、落库与入队，
/// 四步流水线由后台工作器执行。
pub struct GenerationUseCase {
    tasks: Arc<dyn TaskRepository>,
    batches: Arc<dyn BatchRepository>,
    ledger: Arc<CostLedger>,
    queue: Arc<dyn JobQueue>,
    max_batch_size: usize,
}

impl GenerationUseCase {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        batches: Arc<dyn BatchRepository>,
        ledger: Arc<CostLedger>,
        queue: Arc<dyn JobQueue>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            tasks,
            batches,
            ledger,
            queue,
            max_batch_size,
        }
    }

    async fn enqueue(&self, job: Job) -> Result<(), UseCaseError> {
        let kind = match &job {
            Job::RunTask { .. } => "run_task",
            Job::RunChild { .. } => "run_child",
            Job::RunBatch { .. } => "run_batch",
            Job::RetryBatch { .. } => "retry_batch",
        };
        self.queue.enqueue(job).await?;
        metrics::counter!("jobs_enqueued_total", "kind" => kind).increment(1);
        Ok(())
    }

    /// 提交单个生成任务
    #[instrument(skip_all)]
    pub async fn submit_task(
        &self,
        dto: CreateTaskRequestDto,
    ) -> Result<GenerationTask, UseCaseError> {
        dto.validate()
            .map_err(|e| UseCaseError::Validation(e.to_string()))?;

        let task = GenerationTask::new(
            dto.style.into_style_source(),
            dto.product_image_key,
            selector_or_default(dto.model_selector),
            dto.user_metadata,
        );
        let task = self.tasks.create(&task).await?;

        self.enqueue(Job::RunTask {
            task_id: task.id,
            start_stage: Stage::StyleAnalysis,
        })
        .await?;

        info!(task_id = %task.id, "Generation task submitted");
        Ok(task)
    }

    /// 提交批量任务，每张商品图一个子任务
    #[instrument(skip_all)]
    pub async fn submit_batch(&self, dto: CreateBatchRequestDto) -> Result<BatchView, UseCaseError> {
        dto.validate()
            .map_err(|e| UseCaseError::Validation(e.to_string()))?;
        if dto.product_image_keys.len() > self.max_batch_size {
            return Err(UseCaseError::Validation(format!(
                "batch size {} exceeds limit {}",
                dto.product_image_keys.len(),
                self.max_batch_size
            )));
        }

        let style_source = dto.style.into_style_source();
        let model_selector = selector_or_default(dto.model_selector);
        let batch = BatchTask::new(style_source.clone(), dto.product_image_keys.len() as i32);

        let children: Vec<GenerationTask> = dto
            .product_image_keys
            .into_iter()
            .enumerate()
            .map(|(index, key)| {
                GenerationTask::new(
                    style_source.clone(),
                    key,
                    model_selector.clone(),
                    dto.user_metadata.clone(),
                )
                .in_batch(batch.id, index as i32)
            })
            .collect();

        let batch = self.batches.create(&batch).await?;
        self.tasks.create_many(&children).await?;
        self.enqueue(Job::RunBatch { batch_id: batch.id }).await?;

        info!(batch_id = %batch.id, children = children.len(), "Batch submitted");
        Ok(BatchView { batch, children })
    }

    pub async fn get_task(&self, id: Uuid) -> Result<GenerationTask, UseCaseError> {
        self.tasks
            .find_by_id(id)
            .await?
            .ok_or(UseCaseError::TaskNotFound(id))
    }

    pub async fn get_batch(&self, id: Uuid) -> Result<BatchView, UseCaseError> {
        let batch = self
            .batches
            .find_by_id(id)
            .await?
            .ok_or(UseCaseError::BatchNotFound(id))?;
        let children = self.tasks.find_by_batch_id(id).await?;
        Ok(BatchView { batch, children })
    }

    /// 任务费用明细，以及按计费类型拆分的合计
    pub async fn get_task_costs(&self, id: Uuid) -> Result<TaskCostView, UseCaseError> {
        self.get_task(id).await?;
        let entries = self.ledger.entries(id).await?;
        let summary = self.ledger.summarize(&entries);
        Ok(TaskCostView {
            task_id: id,
            entries,
            summary,
        })
    }

    /// 重试失败的任务，从失败的那一步继续
    ///
    /// 前置阶段产出缺失时直接返回 [`UseCaseError::CannotResume`]，任务保持 Failed。
    /// 任务先回到 Pending 再入队，重复的重试请求会被拒绝。批次子任务交给
    /// 批次编排器执行，并立即重新统计批次计数。
    #[instrument(skip_all, fields(task_id = %id))]
    pub async fn retry_task(&self, id: Uuid) -> Result<GenerationTask, UseCaseError> {
        let mut task = self.get_task(id).await?;
        if task.status != TaskStatus::Failed {
            return Err(UseCaseError::NotRetryable(format!(
                "task {} is {}",
                id, task.status
            )));
        }

        let shared_available = match task.batch_id {
            Some(batch_id) if task.uses_shared_analysis() => self
                .batches
                .find_by_id(batch_id)
                .await?
                .ok_or(UseCaseError::BatchNotFound(batch_id))?
                .shared_analysis
                .is_some(),
            _ => false,
        };
        let start = task.resume_stage(task.min_start_stage());
        if let Some(missing) = task.first_missing_before(start, shared_available) {
            return Err(UseCaseError::CannotResume {
                task_id: id,
                requested: start,
                missing,
            });
        }

        task.requeue()?;
        let task = self.tasks.update(&task).await?;

        let job = match task.batch_id {
            Some(batch_id) => {
                self.refresh_batch_counts(batch_id).await?;
                Job::RunChild {
                    batch_id,
                    task_id: id,
                    start_stage: start,
                }
            }
            None => Job::RunTask {
                task_id: id,
                start_stage: start,
            },
        };
        self.enqueue(job).await?;

        info!(start = %start, "Task retry enqueued");
        Ok(task)
    }

    /// 按子任务当前状态写回批次计数与状态
    async fn refresh_batch_counts(&self, batch_id: Uuid) -> Result<(), UseCaseError> {
        let children = self.tasks.find_by_batch_id(batch_id).await?;
        let counts = BatchCounts::tally(children.iter().map(|child| child.status));
        self.batches
            .update_counts(batch_id, &counts, BatchStatus::aggregate(&counts))
            .await?;
        Ok(())
    }

    /// 重试批次中失败的子任务
    ///
    /// 共享分析缺失时（第 1 步就失败了）整批重跑，否则只重跑失败的子任务。
    #[instrument(skip_all, fields(batch_id = %id))]
    pub async fn retry_batch(&self, id: Uuid) -> Result<BatchTask, UseCaseError> {
        let batch = self
            .batches
            .find_by_id(id)
            .await?
            .ok_or(UseCaseError::BatchNotFound(id))?;
        if !matches!(batch.status, BatchStatus::Failed | BatchStatus::PartialFailed) {
            return Err(UseCaseError::NotRetryable(format!(
                "batch {} is {}",
                id, batch.status
            )));
        }

        self.batches
            .update_status(id, BatchStatus::Processing)
            .await?;

        let job = if batch.style_source.needs_shared_analysis() && batch.shared_analysis.is_none()
        {
            Job::RunBatch { batch_id: id }
        } else {
            Job::RetryBatch { batch_id: id }
        };
        self.enqueue(job).await?;

        info!("Batch retry enqueued");
        let mut batch = batch;
        batch.status = BatchStatus::Processing;
        Ok(batch)
    }
}

fn selector_or_default(selector: Option<String>) -> String {
    selector
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL_SELECTOR.to_string())
}
