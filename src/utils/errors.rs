// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::task::{DomainError, Stage};
use crate::domain::repositories::storage_repository::StorageError;
use crate::domain::repositories::task_repository::RepositoryError;

/// 流水线执行错误
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 恢复前置条件不满足：请求的起始阶段之前有产出缺失
    #[error("cannot-resume: task {task_id} requested stage {requested} but output of {missing} is missing")]
    CannotResume {
        task_id: Uuid,
        requested: Stage,
        missing: Stage,
    },

    /// 某个阶段执行失败，已记录到任务上
    #[error("阶段 {stage} 执行失败: {message}")]
    StageFailed { stage: Stage, message: String },

    /// 批次共享风格分析失败
    #[error("共享风格分析失败: {0}")]
    SharedAnalysis(String),

    /// 参考图模式批次缺少已保存的共享分析
    #[error("批次 {0} 缺少共享风格分析")]
    MissingSharedAnalysis(Uuid),

    #[error("任务未找到: {0}")]
    TaskNotFound(Uuid),

    #[error("批次未找到: {0}")]
    BatchNotFound(Uuid),

    /// 任务状态不允许该操作
    #[error("任务 {0} 当前状态不可重试")]
    NotRetryable(Uuid),

    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("领域错误: {0}")]
    Domain(#[from] DomainError),
}

impl PipelineError {
    pub fn is_cannot_resume(&self) -> bool {
        matches!(self, PipelineError::CannotResume { .. })
    }
}
