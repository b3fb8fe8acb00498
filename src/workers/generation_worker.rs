// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::batch_orchestrator::BatchOrchestrator;
use super::task_runner::TaskRunner;
use crate::queue::job_queue::{Job, JobQueue, QueueError};
use crate::utils::errors::PipelineError;

/// 生成工作器
///
/// 循环取出作业并分派给任务状态机或批次编排器。
/// 作业失败只记录日志，不会让循环退出。
pub struct GenerationWorker {
    runner: Arc<TaskRunner>,
    orchestrator: Arc<BatchOrchestrator>,
    worker_id: Uuid,
}

impl GenerationWorker {
    pub fn new(runner: Arc<TaskRunner>, orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self {
            runner,
            orchestrator,
            worker_id: Uuid::new_v4(),
        }
    }

    /// 运行工作器，直到队列关闭
    pub async fn run<Q>(&self, queue: Arc<Q>)
    where
        Q: JobQueue + ?Sized,
    {
        info!("Generation worker {} started", self.worker_id);

        loop {
            match queue.dequeue().await {
                Ok(job) => {
                    if let Err(e) = self.process_job(job).await {
                        error!("Error processing job: {}", e);
                    }
                }
                Err(QueueError::Closed) => {
                    warn!("Job queue closed, worker {} exiting", self.worker_id);
                    break;
                }
            }
        }
    }

    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn process_job(&self, job: Job) -> Result<(), PipelineError> {
        match job {
            Job::RunTask {
                task_id,
                start_stage,
            } => self.runner.run(task_id, start_stage).await.map(|_| ()),
            Job::RunChild {
                batch_id,
                task_id,
                start_stage,
            } => self
                .orchestrator
                .run_child(batch_id, task_id, start_stage)
                .await
                .map(|_| ()),
            Job::RunBatch { batch_id } => self.orchestrator.run(batch_id).await.map(|_| ()),
            Job::RetryBatch { batch_id } => {
                self.orchestrator.retry_failed(batch_id).await.map(|_| ())
            }
        }
    }
}
