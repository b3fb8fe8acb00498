// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::analysis::StyleAnalysis;
use super::style::StyleSource;
use super::task::TaskStatus;

/// 批量任务实体
///
/// 一次提交多张商品图、共用同一个风格来源。参考图模式下风格分析
/// 只做一次，挂在批次上，子任务只读引用。计数字段永远由子任务状态
/// 重新推导，不单独累加。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTask {
    /// 批次唯一标识符
    pub id: Uuid,
    /// 批次状态
    pub status: BatchStatus,
    /// 共用的风格来源
    pub style_source: StyleSource,
    /// 子任务总数
    pub total_count: i32,
    /// 已完成子任务数
    pub completed_count: i32,
    /// 失败子任务数
    pub failed_count: i32,
    /// 共享的参考图风格分析
    pub shared_analysis: Option<StyleAnalysis>,
    /// 产出共享分析的模型
    pub shared_analysis_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 批次状态枚举
///
/// Pending → Processing → Completed / Failed / PartialFailed，
/// 只有重试失败子任务时才会从终态回到 Processing。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    PartialFailed,
}

impl BatchStatus {
    /// 由子任务计数推导批次状态
    pub fn aggregate(counts: &BatchCounts) -> Self {
        if counts.completed + counts.failed < counts.total {
            BatchStatus::Processing
        } else if counts.failed == 0 {
            BatchStatus::Completed
        } else if counts.completed == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartialFailed
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::PartialFailed
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Processing => write!(f, "processing"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Failed => write!(f, "failed"),
            BatchStatus::PartialFailed => write!(f, "partial_failed"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "processing" => Ok(BatchStatus::Processing),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            "partial_failed" => Ok(BatchStatus::PartialFailed),
            _ => Err(()),
        }
    }
}

/// 子任务计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: i32,
    pub completed: i32,
    pub failed: i32,
}

impl BatchCounts {
    /// 从子任务当前状态统计
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = TaskStatus>,
    {
        statuses
            .into_iter()
            .fold(BatchCounts::default(), |mut counts, status| {
                counts.total += 1;
                match status {
                    TaskStatus::Completed => counts.completed += 1,
                    TaskStatus::Failed => counts.failed += 1,
                    _ => {}
                }
                counts
            })
    }
}

impl BatchTask {
    pub fn new(style_source: StyleSource, total_count: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: BatchStatus::Pending,
            style_source,
            total_count,
            completed_count: 0,
            failed_count: 0,
            shared_analysis: None,
            shared_analysis_model: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            total: self.total_count,
            completed: self.completed_count,
            failed: self.failed_count,
        }
    }

    /// 写入重新统计的计数并推导状态
    pub fn apply_counts(&mut self, counts: BatchCounts) {
        self.total_count = counts.total;
        self.completed_count = counts.completed;
        self.failed_count = counts.failed;
        self.status = BatchStatus::aggregate(&counts);
        let now = Utc::now();
        self.updated_at = now;
        self.completed_at = if self.status.is_terminal() {
            Some(now)
        } else {
            None
        };
    }
}
