// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::step_executor::StepExecutor;
use super::task_runner::TaskRunner;
use crate::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use crate::domain::models::task::{GenerationTask, Stage, TaskStatus};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::utils::concurrency::run_bounded;
use crate::utils::errors::PipelineError;

/// 默认子任务并发上限
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// 批次编排器
///
/// 参考图模式下先计算一次共享风格分析并挂到批次上，再通过有界并发
/// 驱动各子任务的状态机。每个子任务结束后都会重新统计批次计数和状态，
/// 子任务的失败只体现在它自己的状态和批次计数里。
pub struct BatchOrchestrator {
    batches: Arc<dyn BatchRepository>,
    tasks: Arc<dyn TaskRepository>,
    runner: Arc<TaskRunner>,
    executor: Arc<StepExecutor>,
    concurrency: usize,
    /// 每个批次一把锁：共享分析只计算一次，子任务不会被两次运行同时驱动
    batch_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl BatchOrchestrator {
    pub fn new(
        batches: Arc<dyn BatchRepository>,
        tasks: Arc<dyn TaskRepository>,
        runner: Arc<TaskRunner>,
        executor: Arc<StepExecutor>,
        concurrency: usize,
    ) -> Self {
        Self {
            batches,
            tasks,
            runner,
            executor,
            concurrency: concurrency.max(1),
            batch_locks: DashMap::new(),
        }
    }

    /// 运行批次
    ///
    /// 批次级错误（共享分析失败、批次记录缺失等）会把批次置为 Failed 并返回给调用方。
    /// 同一批次的运行、重试与子任务重试互斥执行。
    #[instrument(skip_all, fields(batch_id = %batch_id))]
    pub async fn run(&self, batch_id: Uuid) -> Result<BatchTask, PipelineError> {
        let lock = self.batch_lock(batch_id);
        let outcome = {
            let _guard = lock.lock().await;
            match self.run_inner(batch_id).await {
                Ok(batch) => Ok(batch),
                Err(err) => {
                    error!(error = %err, "Batch run failed");
                    if !matches!(err, PipelineError::BatchNotFound(_)) {
                        if let Err(update_err) =
                            self.batches.update_status(batch_id, BatchStatus::Failed).await
                        {
                            error!(error = %update_err, "Failed to mark batch as failed");
                        }
                    }
                    Err(err)
                }
            }
        };
        self.release_batch_lock(batch_id, lock);
        outcome
    }

    async fn run_inner(&self, batch_id: Uuid) -> Result<BatchTask, PipelineError> {
        let batch = self.load_batch(batch_id).await?;
        let children = self.tasks.find_by_batch_id(batch_id).await?;
        let unsettled: Vec<&GenerationTask> = children
            .iter()
            .filter(|child| !child.status.is_terminal())
            .collect();
        let needs_analysis =
            batch.style_source.needs_shared_analysis() && batch.shared_analysis.is_none();

        if unsettled.is_empty() && !needs_analysis {
            debug!("All children settled, nothing to run");
            return self.refresh_aggregate(batch_id).await;
        }

        self.batches
            .update_status(batch_id, BatchStatus::Processing)
            .await?;
        info!(children = children.len(), "Batch processing started");

        let shared_available = if batch.style_source.needs_shared_analysis() {
            self.ensure_shared_analysis(&batch, &children).await?
        } else {
            false
        };

        let jobs: Vec<(Uuid, Stage)> = unsettled
            .into_iter()
            .map(|child| (child.id, Self::start_stage(child, shared_available)))
            .collect();

        self.drive_children(batch_id, jobs).await;
        self.refresh_aggregate(batch_id).await
    }

    /// 只重试当前处于 Failed 的子任务
    ///
    /// 参考图模式下直接使用批次上已保存的共享分析，不会重新计算。
    /// 没有失败子任务时只重新统计批次状态。
    #[instrument(skip_all, fields(batch_id = %batch_id))]
    pub async fn retry_failed(&self, batch_id: Uuid) -> Result<BatchTask, PipelineError> {
        let lock = self.batch_lock(batch_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.retry_failed_inner(batch_id).await
        };
        self.release_batch_lock(batch_id, lock);
        outcome
    }

    async fn retry_failed_inner(&self, batch_id: Uuid) -> Result<BatchTask, PipelineError> {
        let batch = self.load_batch(batch_id).await?;
        let failed = self
            .tasks
            .find_by_batch_and_status(batch_id, TaskStatus::Failed)
            .await?;

        if failed.is_empty() {
            info!("No failed children, nothing to retry");
            return self.refresh_aggregate(batch_id).await;
        }

        if batch.style_source.needs_shared_analysis() && batch.shared_analysis.is_none() {
            return Err(PipelineError::MissingSharedAnalysis(batch_id));
        }

        self.batches
            .update_status(batch_id, BatchStatus::Processing)
            .await?;

        let mut jobs = Vec::with_capacity(failed.len());
        for mut child in failed {
            let start = child.resume_stage(child.min_start_stage());
            child.requeue()?;
            self.tasks.update(&child).await?;
            jobs.push((child.id, start));
        }
        info!(retrying = jobs.len(), "Retrying failed children");

        self.drive_children(batch_id, jobs).await;
        self.refresh_aggregate(batch_id).await
    }

    /// 单独重试批次中的一个子任务，结束后重新统计批次
    ///
    /// 子任务在等待批次锁期间已被其他运行处理（不再是 Pending）时跳过执行。
    #[instrument(skip_all, fields(batch_id = %batch_id, task_id = %task_id))]
    pub async fn run_child(
        &self,
        batch_id: Uuid,
        task_id: Uuid,
        start: Stage,
    ) -> Result<BatchTask, PipelineError> {
        let lock = self.batch_lock(batch_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.run_child_inner(batch_id, task_id, start).await
        };
        self.release_batch_lock(batch_id, lock);
        outcome
    }

    async fn run_child_inner(
        &self,
        batch_id: Uuid,
        task_id: Uuid,
        start: Stage,
    ) -> Result<BatchTask, PipelineError> {
        let child = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(PipelineError::TaskNotFound(task_id))?;

        if child.status == TaskStatus::Pending {
            self.drive_children(batch_id, vec![(task_id, start)]).await;
        } else {
            debug!(status = %child.status, "Child already handled, skipping");
        }
        self.refresh_aggregate(batch_id).await
    }

    /// 从子任务当前状态重新统计批次计数和状态
    pub async fn refresh_aggregate(&self, batch_id: Uuid) -> Result<BatchTask, PipelineError> {
        let mut batch = self.load_batch(batch_id).await?;
        let children = self.tasks.find_by_batch_id(batch_id).await?;
        let counts = BatchCounts::tally(children.iter().map(|child| child.status));

        batch.apply_counts(counts);
        self.batches
            .update_counts(batch_id, &counts, batch.status)
            .await?;
        debug!(
            completed = counts.completed,
            failed = counts.failed,
            total = counts.total,
            status = %batch.status,
            "Batch aggregate refreshed"
        );
        Ok(batch)
    }

    fn batch_lock(&self, batch_id: Uuid) -> Arc<Mutex<()>> {
        self.batch_locks
            .entry(batch_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 没有其他持有者时移除批次锁
    fn release_batch_lock(&self, batch_id: Uuid, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.batch_locks
            .remove_if(&batch_id, |_, held| Arc::strong_count(held) == 1);
    }

    /// 子任务的起始阶段：从最小起始阶段起第一个没有产出的阶段
    fn start_stage(child: &GenerationTask, shared_available: bool) -> Stage {
        child
            .next_stage_to_run(child.min_start_stage(), shared_available)
            .unwrap_or(Stage::ImageGeneration)
    }

    /// 有界并发驱动子任务，单个子任务的错误在这里消化
    async fn drive_children(&self, batch_id: Uuid, jobs: Vec<(Uuid, Stage)>) {
        let ops: Vec<_> = jobs
            .into_iter()
            .map(|(task_id, start)| {
                move || async move {
                    match self.runner.run(task_id, start).await {
                        Ok(_) => {
                            metrics::counter!("batch_children_total", "outcome" => "completed")
                                .increment(1);
                        }
                        Err(err) => {
                            warn!(task_id = %task_id, error = %err, "Child task failed");
                            metrics::counter!("batch_children_total", "outcome" => "failed")
                                .increment(1);
                        }
                    }

                    if let Err(err) = self.refresh_aggregate(batch_id).await {
                        warn!(error = %err, "Failed to refresh batch aggregate");
                    }
                }
            })
            .collect();

        run_bounded(ops, self.concurrency).await;
    }

    /// 确保共享分析已存在，返回是否可用
    ///
    /// 调用方持有批次锁。费用记到批次序号最小的子任务上。
    async fn ensure_shared_analysis(
        &self,
        batch: &BatchTask,
        children: &[GenerationTask],
    ) -> Result<bool, PipelineError> {
        if batch.shared_analysis.is_some() {
            debug!("Shared analysis already present, reusing");
            return Ok(true);
        }

        let Some(attributed) = children.first() else {
            return Ok(false);
        };

        info!("Computing shared style analysis");
        let result = match self.executor.analyze_style(&batch.style_source).await {
            Ok(result) => result,
            Err(err) => {
                metrics::counter!("stage_failures_total", "stage" => Stage::StyleAnalysis.name())
                    .increment(1);
                return Err(PipelineError::SharedAnalysis(err.to_string()));
            }
        };

        self.batches
            .save_shared_analysis(batch.id, &result.output, &result.model)
            .await?;
        self.executor
            .settle_cost(attributed.id, Stage::StyleAnalysis, &result.charge)
            .await;

        Ok(true)
    }

    async fn load_batch(&self, batch_id: Uuid) -> Result<BatchTask, PipelineError> {
        self.batches
            .find_by_id(batch_id)
            .await?
            .ok_or(PipelineError::BatchNotFound(batch_id))
    }
}
