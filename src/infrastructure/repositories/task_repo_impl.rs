// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{GenerationTask, TaskCost, TaskStatus};
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};
use crate::infrastructure::database::entities::generation_task as task_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 生成任务仓库实现
///
/// 基于SeaORM实现。各步产出在这里与 JSON 列互相转换，
/// 领域层只看到结构化的值。
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TaskRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_json_opt<T: serde::Serialize>(
    value: Option<&T>,
) -> Result<Option<serde_json::Value>, RepositoryError> {
    value.map(serde_json::to_value).transpose().map_err(Into::into)
}

fn from_json_opt<T: serde::de::DeserializeOwned>(
    value: Option<serde_json::Value>,
) -> Result<Option<T>, RepositoryError> {
    value.map(serde_json::from_value).transpose().map_err(Into::into)
}

impl TryFrom<task_entity::Model> for GenerationTask {
    type Error = RepositoryError;

    fn try_from(model: task_entity::Model) -> Result<Self, Self::Error> {
        let status: TaskStatus = model.status.parse().map_err(|_| {
            RepositoryError::Serialization(format!("invalid task status: {}", model.status))
        })?;

        Ok(Self {
            id: model.id,
            status,
            current_step: model.current_step,
            total_steps: model.total_steps,
            style_source: serde_json::from_value(model.style_source)?,
            product_image_key: model.product_image_key,
            user_metadata: model.user_metadata,
            model_selector: model.model_selector,
            style_analysis: from_json_opt(model.style_analysis)?,
            content_analysis: from_json_opt(model.content_analysis)?,
            generated_prompt: model.generated_prompt,
            result_images: serde_json::from_value(model.result_images)?,
            failed_step: model.failed_step,
            error_message: model.error_message,
            model_trace: from_json_opt(model.model_trace)?,
            batch_id: model.batch_id,
            batch_index: model.batch_index,
            total_cost: TaskCost {
                metered: model.metered_cost,
                fixed: model.fixed_cost,
            },
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
            completed_at: model.completed_at.map(Into::into),
        })
    }
}

impl TryFrom<&GenerationTask> for task_entity::ActiveModel {
    type Error = RepositoryError;

    fn try_from(task: &GenerationTask) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Set(task.id),
            status: Set(task.status.to_string()),
            current_step: Set(task.current_step),
            total_steps: Set(task.total_steps),
            style_source: Set(serde_json::to_value(&task.style_source)?),
            product_image_key: Set(task.product_image_key.clone()),
            user_metadata: Set(task.user_metadata.clone()),
            model_selector: Set(task.model_selector.clone()),
            style_analysis: Set(to_json_opt(task.style_analysis.as_ref())?),
            content_analysis: Set(to_json_opt(task.content_analysis.as_ref())?),
            generated_prompt: Set(task.generated_prompt.clone()),
            result_images: Set(serde_json::to_value(&task.result_images)?),
            failed_step: Set(task.failed_step),
            error_message: Set(task.error_message.clone()),
            model_trace: Set(to_json_opt(task.model_trace.as_ref())?),
            batch_id: Set(task.batch_id),
            batch_index: Set(task.batch_index),
            metered_cost: Set(task.total_cost.metered),
            fixed_cost: Set(task.total_cost.fixed),
            created_at: Set(task.created_at.into()),
            updated_at: Set(task.updated_at.into()),
            completed_at: Set(task.completed_at.map(Into::into)),
        })
    }
}

fn into_tasks(models: Vec<task_entity::Model>) -> Result<Vec<GenerationTask>, RepositoryError> {
    models.into_iter().map(GenerationTask::try_from).collect()
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &GenerationTask) -> Result<GenerationTask, RepositoryError> {
        let model = task_entity::ActiveModel::try_from(task)?;
        model.insert(self.db.as_ref()).await?;
        Ok(task.clone())
    }

    async fn create_many(&self, tasks: &[GenerationTask]) -> Result<(), RepositoryError> {
        if tasks.is_empty() {
            return Ok(());
        }
        let models = tasks
            .iter()
            .map(task_entity::ActiveModel::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        task_entity::Entity::insert_many(models)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationTask>, RepositoryError> {
        task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(GenerationTask::try_from)
            .transpose()
    }

    async fn update(&self, task: &GenerationTask) -> Result<GenerationTask, RepositoryError> {
        let mut model = task_entity::ActiveModel::try_from(task)?;
        // 费用列只由 set_total_cost 写入
        model.metered_cost = sea_orm::ActiveValue::NotSet;
        model.fixed_cost = sea_orm::ActiveValue::NotSet;
        model.created_at = sea_orm::ActiveValue::NotSet;

        let updated = model.update(self.db.as_ref()).await?;
        GenerationTask::try_from(updated)
    }

    async fn find_by_batch_id(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<GenerationTask>, RepositoryError> {
        let models = task_entity::Entity::find()
            .filter(task_entity::Column::BatchId.eq(batch_id))
            .order_by_asc(task_entity::Column::BatchIndex)
            .all(self.db.as_ref())
            .await?;
        into_tasks(models)
    }

    async fn find_by_batch_and_status(
        &self,
        batch_id: Uuid,
        status: TaskStatus,
    ) -> Result<Vec<GenerationTask>, RepositoryError> {
        let models = task_entity::Entity::find()
            .filter(task_entity::Column::BatchId.eq(batch_id))
            .filter(task_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(task_entity::Column::BatchIndex)
            .all(self.db.as_ref())
            .await?;
        into_tasks(models)
    }

    async fn set_total_cost(&self, id: Uuid, cost: TaskCost) -> Result<(), RepositoryError> {
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::MeteredCost,
                sea_orm::sea_query::Expr::value(cost.metered),
            )
            .col_expr(
                task_entity::Column::FixedCost,
                sea_orm::sea_query::Expr::value(cost.fixed),
            )
            .filter(task_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
