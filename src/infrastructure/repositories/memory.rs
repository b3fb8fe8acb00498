// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 进程内仓库实现
//!
//! 与数据库实现遵循同样的约定：任务整行更新不覆盖费用合计，
//! 共享分析只写一次。用于开发模式（`database.url = "memory"`）和测试。

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::analysis::StyleAnalysis;
use crate::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use crate::domain::models::cost::CostEntry;
use crate::domain::models::task::{GenerationTask, TaskCost, TaskStatus};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::cost_repository::CostRepository;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};

/// 内存任务仓库
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, GenerationTask>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_index(mut tasks: Vec<GenerationTask>) -> Vec<GenerationTask> {
    tasks.sort_by_key(|task| task.batch_index);
    tasks
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &GenerationTask) -> Result<GenerationTask, RepositoryError> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn create_many(&self, tasks: &[GenerationTask]) -> Result<(), RepositoryError> {
        let mut map = self.tasks.write().await;
        for task in tasks {
            map.insert(task.id, task.clone());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationTask>, RepositoryError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, task: &GenerationTask) -> Result<GenerationTask, RepositoryError> {
        let mut map = self.tasks.write().await;
        let stored = map.get_mut(&task.id).ok_or(RepositoryError::NotFound)?;

        let total_cost = stored.total_cost;
        let created_at = stored.created_at;
        *stored = task.clone();
        stored.total_cost = total_cost;
        stored.created_at = created_at;

        Ok(stored.clone())
    }

    async fn find_by_batch_id(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<GenerationTask>, RepositoryError> {
        let map = self.tasks.read().await;
        let children = map
            .values()
            .filter(|task| task.batch_id == Some(batch_id))
            .cloned()
            .collect();
        Ok(sorted_by_index(children))
    }

    async fn find_by_batch_and_status(
        &self,
        batch_id: Uuid,
        status: TaskStatus,
    ) -> Result<Vec<GenerationTask>, RepositoryError> {
        let map = self.tasks.read().await;
        let children = map
            .values()
            .filter(|task| task.batch_id == Some(batch_id) && task.status == status)
            .cloned()
            .collect();
        Ok(sorted_by_index(children))
    }

    async fn set_total_cost(&self, id: Uuid, cost: TaskCost) -> Result<(), RepositoryError> {
        let mut map = self.tasks.write().await;
        let stored = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.total_cost = cost;
        Ok(())
    }
}

/// 内存批次仓库
#[derive(Default)]
pub struct InMemoryBatchRepository {
    batches: RwLock<HashMap<Uuid, BatchTask>>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn create(&self, batch: &BatchTask) -> Result<BatchTask, RepositoryError> {
        self.batches.write().await.insert(batch.id, batch.clone());
        Ok(batch.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BatchTask>, RepositoryError> {
        Ok(self.batches.read().await.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: BatchStatus) -> Result<(), RepositoryError> {
        let mut map = self.batches.write().await;
        let batch = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let now = Utc::now();
        batch.status = status;
        batch.updated_at = now;
        batch.completed_at = status.is_terminal().then_some(now);
        Ok(())
    }

    async fn save_shared_analysis(
        &self,
        id: Uuid,
        analysis: &StyleAnalysis,
        model: &str,
    ) -> Result<(), RepositoryError> {
        let mut map = self.batches.write().await;
        let batch = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if batch.shared_analysis.is_none() {
            batch.shared_analysis = Some(analysis.clone());
            batch.shared_analysis_model = Some(model.to_string());
            batch.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_counts(
        &self,
        id: Uuid,
        counts: &BatchCounts,
        status: BatchStatus,
    ) -> Result<(), RepositoryError> {
        let mut map = self.batches.write().await;
        let batch = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let now = Utc::now();
        batch.total_count = counts.total;
        batch.completed_count = counts.completed;
        batch.failed_count = counts.failed;
        batch.status = status;
        batch.updated_at = now;
        batch.completed_at = status.is_terminal().then_some(now);
        Ok(())
    }
}

/// 内存费用明细仓库
#[derive(Default)]
pub struct InMemoryCostRepository {
    entries: RwLock<Vec<CostEntry>>,
}

impl InMemoryCostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CostRepository for InMemoryCostRepository {
    async fn append(&self, entry: &CostEntry) -> Result<(), RepositoryError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<CostEntry>, RepositoryError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.task_id == task_id)
            .cloned()
            .collect())
    }
}
