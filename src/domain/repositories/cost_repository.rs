// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use super::task_repository::RepositoryError;
use crate::domain::models::cost::CostEntry;

/// 费用明细仓库，只追加不修改
#[async_trait]
pub trait CostRepository: Send + Sync {
    /// Append a single cost entry
    async fn append(&self, entry: &CostEntry) -> Result<(), RepositoryError>;

    /// All entries recorded for a task, oldest first
    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<CostEntry>, RepositoryError>;
}
