// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{GenerationTask, TaskCost, TaskStatus};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储边界上的序列化/反序列化失败
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// 生成任务仓库特质
///
/// 定义生成任务数据访问接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &GenerationTask) -> Result<GenerationTask, RepositoryError>;

    /// 批量创建任务（批次提交时使用）
    async fn create_many(&self, tasks: &[GenerationTask]) -> Result<(), RepositoryError>;

    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationTask>, RepositoryError>;

    /// 更新任务的状态、进度、各步产出和失败信息
    ///
    /// 不写入费用字段，费用合计只由 [`TaskRepository::set_total_cost`] 维护，
    /// 避免状态机的整行更新覆盖并发写入的费用。
    async fn update(&self, task: &GenerationTask) -> Result<GenerationTask, RepositoryError>;

    /// 查询批次下所有子任务，按批次序号排序
    async fn find_by_batch_id(&self, batch_id: Uuid)
        -> Result<Vec<GenerationTask>, RepositoryError>;

    /// 查询批次下处于指定状态的子任务
    async fn find_by_batch_and_status(
        &self,
        batch_id: Uuid,
        status: TaskStatus,
    ) -> Result<Vec<GenerationTask>, RepositoryError>;

    /// 覆盖写入任务的费用合计
    async fn set_total_cost(&self, id: Uuid, cost: TaskCost) -> Result<(), RepositoryError>;
}
