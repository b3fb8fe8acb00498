// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::domain::models::task::Stage;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 队列已关闭
    #[error("Queue closed")]
    Closed,
}

/// 后台作业
///
/// 提交边界只负责落库并入队，实际执行由后台工作器完成。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// 从指定阶段执行单个任务
    RunTask { task_id: Uuid, start_stage: Stage },
    /// 单独重试批次中的一个子任务
    RunChild {
        batch_id: Uuid,
        task_id: Uuid,
        start_stage: Stage,
    },
    /// 运行整个批次
    RunBatch { batch_id: Uuid },
    /// 只重试批次中失败的子任务
    RetryBatch { batch_id: Uuid },
}

/// 作业队列特质
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队作业
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;

    /// 等待并取出下一个作业，队列关闭后返回 [`QueueError::Closed`]
    async fn dequeue(&self) -> Result<Job, QueueError>;
}

/// 进程内作业队列
pub struct InMemoryJobQueue {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Mutex<mpsc::UnboundedReceiver<Job>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// 非阻塞取出一个作业，队列为空时返回 None
    pub async fn try_dequeue(&self) -> Option<Job> {
        self.receiver.lock().await.try_recv().ok()
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self) -> Result<Job, QueueError> {
        self.receiver.lock().await.recv().await.ok_or(QueueError::Closed)
    }
}
