// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::analysis::StyleAnalysis;
use crate::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use crate::domain::repositories::batch_repository::BatchRepository;
use crate::domain::repositories::task_repository::RepositoryError;
use crate::infrastructure::database::entities::batch_task as batch_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 批量任务仓库实现
pub struct BatchRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl BatchRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn ensure_updated(rows_affected: u64) -> Result<(), RepositoryError> {
        if rows_affected == 0 {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }
}

impl TryFrom<batch_entity::Model> for BatchTask {
    type Error = RepositoryError;

    fn try_from(model: batch_entity::Model) -> Result<Self, Self::Error> {
        let status: BatchStatus = model.status.parse().map_err(|_| {
            RepositoryError::Serialization(format!("invalid batch status: {}", model.status))
        })?;

        Ok(Self {
            id: model.id,
            status,
            style_source: serde_json::from_value(model.style_source)?,
            total_count: model.total_count,
            completed_count: model.completed_count,
            failed_count: model.failed_count,
            shared_analysis: model
                .shared_analysis
                .map(serde_json::from_value)
                .transpose()?,
            shared_analysis_model: model.shared_analysis_model,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
            completed_at: model.completed_at.map(Into::into),
        })
    }
}

#[async_trait]
impl BatchRepository for BatchRepositoryImpl {
    async fn create(&self, batch: &BatchTask) -> Result<BatchTask, RepositoryError> {
        let model = batch_entity::ActiveModel {
            id: Set(batch.id),
            status: Set(batch.status.to_string()),
            style_source: Set(serde_json::to_value(&batch.style_source)?),
            total_count: Set(batch.total_count),
            completed_count: Set(batch.completed_count),
            failed_count: Set(batch.failed_count),
            shared_analysis: Set(batch
                .shared_analysis
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?),
            shared_analysis_model: Set(batch.shared_analysis_model.clone()),
            created_at: Set(batch.created_at.into()),
            updated_at: Set(batch.updated_at.into()),
            completed_at: Set(batch.completed_at.map(Into::into)),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(batch.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BatchTask>, RepositoryError> {
        batch_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(BatchTask::try_from)
            .transpose()
    }

    async fn update_status(&self, id: Uuid, status: BatchStatus) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let completed_at = status.is_terminal().then_some(now);
        let result = batch_entity::Entity::update_many()
            .col_expr(batch_entity::Column::Status, Expr::value(status.to_string()))
            .col_expr(batch_entity::Column::UpdatedAt, Expr::value(now))
            .col_expr(batch_entity::Column::CompletedAt, Expr::value(completed_at))
            .filter(batch_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Self::ensure_updated(result.rows_affected)
    }

    async fn save_shared_analysis(
        &self,
        id: Uuid,
        analysis: &StyleAnalysis,
        model: &str,
    ) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(analysis)?;
        // 只在尚未写入时写入，共享分析一经保存不再修改
        let result = batch_entity::Entity::update_many()
            .col_expr(batch_entity::Column::SharedAnalysis, Expr::value(value))
            .col_expr(
                batch_entity::Column::SharedAnalysisModel,
                Expr::value(model.to_string()),
            )
            .col_expr(batch_entity::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(batch_entity::Column::Id.eq(id))
            .filter(batch_entity::Column::SharedAnalysis.is_null())
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            // 记录不存在，或者已被其他执行路径写入
            return match self.find_by_id(id).await? {
                Some(_) => Ok(()),
                None => Err(RepositoryError::NotFound),
            };
        }
        Ok(())
    }

    async fn update_counts(
        &self,
        id: Uuid,
        counts: &BatchCounts,
        status: BatchStatus,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let completed_at = status.is_terminal().then_some(now);
        let result = batch_entity::Entity::update_many()
            .col_expr(batch_entity::Column::TotalCount, Expr::value(counts.total))
            .col_expr(
                batch_entity::Column::CompletedCount,
                Expr::value(counts.completed),
            )
            .col_expr(batch_entity::Column::FailedCount, Expr::value(counts.failed))
            .col_expr(batch_entity::Column::Status, Expr::value(status.to_string()))
            .col_expr(batch_entity::Column::UpdatedAt, Expr::value(now))
            .col_expr(batch_entity::Column::CompletedAt, Expr::value(completed_at))
            .filter(batch_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Self::ensure_updated(result.rows_affected)
    }
}
