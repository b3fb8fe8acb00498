// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::cost::{CostEntry, CostMetrics, CostSummary, CurrencyClass};
use crate::domain::models::task::{Stage, TaskCost};
use crate::domain::repositories::cost_repository::CostRepository;
use crate::domain::repositories::task_repository::{RepositoryError, TaskRepository};

/// 任务级锁的分片数
const LOCK_STRIPES: usize = 64;

/// 默认展示汇率（CNY / USD）
pub const DEFAULT_DISPLAY_RATE: Decimal = dec!(7.2);

/// 费用账本
///
/// 任务合计始终等于该任务全部明细按计费类型的和，每次追加后整体重算。
/// 同一任务的追加与重算按任务 ID 分片加锁串行执行。
pub struct CostLedger {
    costs: Arc<dyn CostRepository>,
    tasks: Arc<dyn TaskRepository>,
    display_rate: Decimal,
    task_locks: Vec<Mutex<()>>,
}

impl CostLedger {
    pub fn new(
        costs: Arc<dyn CostRepository>,
        tasks: Arc<dyn TaskRepository>,
        display_rate: Decimal,
    ) -> Self {
        Self {
            costs,
            tasks,
            display_rate,
            task_locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// 记录一笔费用并重算任务合计
    pub async fn record(
        &self,
        task_id: Uuid,
        stage: Stage,
        call_id: &str,
        amount: Decimal,
        currency: CurrencyClass,
        metrics: CostMetrics,
    ) -> Result<CostEntry, RepositoryError> {
        let entry = CostEntry {
            id: Uuid::new_v4(),
            task_id,
            stage: stage.number(),
            call_id: call_id.to_string(),
            amount,
            currency,
            prompt_tokens: metrics.prompt_tokens,
            completion_tokens: metrics.completion_tokens,
            latency_ms: metrics.latency_ms,
            created_at: Utc::now(),
        };
        let stripe = (task_id.as_u128() % LOCK_STRIPES as u128) as usize;
        let _guard = self.task_locks[stripe].lock().await;

        self.costs.append(&entry).await?;
        let entries = self.costs.find_by_task_id(task_id).await?;
        let total = totals(&entries);
        self.tasks.set_total_cost(task_id, total).await?;

        debug!(
            task_id = %task_id,
            stage = stage.number(),
            amount = %amount,
            currency = %currency,
            "Cost entry recorded"
        );
        Ok(entry)
    }

    /// 读取任务的全部明细
    pub async fn entries(&self, task_id: Uuid) -> Result<Vec<CostEntry>, RepositoryError> {
        self.costs.find_by_task_id(task_id).await
    }

    pub fn summarize(&self, entries: &[CostEntry]) -> CostSummary {
        summarize(entries, self.display_rate)
    }
}

/// 按计费类型分别求和
pub fn totals(entries: &[CostEntry]) -> TaskCost {
    entries.iter().fold(TaskCost::default(), |mut acc, entry| {
        match entry.currency {
            CurrencyClass::Metered => acc.metered += entry.amount,
            CurrencyClass::Fixed => acc.fixed += entry.amount,
        }
        acc
    })
}

/// 按计费类型拆分合计，并用固定汇率折算出一个参考总价（CNY）
///
/// 折算只用于展示，账目以明细为准。
pub fn summarize(entries: &[CostEntry], rate: Decimal) -> CostSummary {
    let total = totals(entries);
    CostSummary {
        metered_total: total.metered,
        fixed_total: total.fixed,
        reference_total: total.metered * rate + total.fixed,
        conversion_rate: rate,
    }
}
