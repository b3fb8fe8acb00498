// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::cost::{CostEntry, CurrencyClass};
use crate::domain::repositories::cost_repository::CostRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::cost_entry as cost_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 费用明细仓库实现，只追加不修改
pub struct CostRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl CostRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<cost_entity::Model> for CostEntry {
    type Error = RepositoryError;

    fn try_from(model: cost_entity::Model) -> Result<Self, Self::Error> {
        let currency: CurrencyClass = model.currency.parse().map_err(|_| {
            RepositoryError::Serialization(format!("invalid currency class: {}", model.currency))
        })?;

        Ok(Self {
            id: model.id,
            task_id: model.task_id,
            stage: model.stage,
            call_id: model.call_id,
            amount: model.amount,
            currency,
            prompt_tokens: model.prompt_tokens,
            completion_tokens: model.completion_tokens,
            latency_ms: model.latency_ms,
            created_at: model.created_at.into(),
        })
    }
}

#[async_trait]
impl CostRepository for CostRepositoryImpl {
    async fn append(&self, entry: &CostEntry) -> Result<(), RepositoryError> {
        let model = cost_entity::ActiveModel {
            id: Set(entry.id),
            task_id: Set(entry.task_id),
            stage: Set(entry.stage),
            call_id: Set(entry.call_id.clone()),
            amount: Set(entry.amount),
            currency: Set(entry.currency.to_string()),
            prompt_tokens: Set(entry.prompt_tokens),
            completion_tokens: Set(entry.completion_tokens),
            latency_ms: Set(entry.latency_ms),
            created_at: Set(entry.created_at.into()),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<CostEntry>, RepositoryError> {
        cost_entity::Entity::find()
            .filter(cost_entity::Column::TaskId.eq(task_id))
            .order_by_asc(cost_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(CostEntry::try_from)
            .collect()
    }
}
