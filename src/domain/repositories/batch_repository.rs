// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::task_repository::RepositoryError;
use crate::domain::models::analysis::StyleAnalysis;
use crate::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use async_trait::async_trait;
use uuid::Uuid;

/// 批量任务仓库特质
///
/// 定义批量任务数据访问接口。子任务通过 [`super::task_repository::TaskRepository`]
/// 按批次 ID 和状态查询。
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// 创建批量任务
    ///
    /// # 参数
    ///
    /// * `batch` - 要创建的批量任务实体
    ///
    /// # 返回值
    ///
    /// * `Ok(BatchTask)` - 成功创建后返回批量任务
    /// * `Err(RepositoryError)` - 创建失败时返回错误
    async fn create(&self, batch: &BatchTask) -> Result<BatchTask, RepositoryError>;

    /// 根据ID查找批量任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BatchTask>, RepositoryError>;

    /// 更新批量任务状态
    async fn update_status(&self, id: Uuid, status: BatchStatus) -> Result<(), RepositoryError>;

    /// 写入共享风格分析
    ///
    /// # 参数
    ///
    /// * `id` - 批量任务的唯一标识符
    /// * `analysis` - 风格分析结果
    /// * `model` - 产出该结果的模型
    async fn save_shared_analysis(
        &self,
        id: Uuid,
        analysis: &StyleAnalysis,
        model: &str,
    ) -> Result<(), RepositoryError>;

    /// 同时写入重新统计的计数和推导出的状态
    async fn update_counts(
        &self,
        id: Uuid,
        counts: &BatchCounts,
        status: BatchStatus,
    ) -> Result<(), RepositoryError>;
}
