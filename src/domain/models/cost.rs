// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 费用明细
///
/// 每一次付费的外部调用对应一条记录。任务总费用永远等于
/// 其所有明细之和。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub id: Uuid,
    pub task_id: Uuid,
    /// 产生费用的步骤（1-4）
    pub stage: i32,
    /// 供应商返回的调用 ID
    pub call_id: String,
    pub amount: Decimal,
    pub currency: CurrencyClass,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub latency_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 计费类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyClass {
    /// 按 token 计量，美元计价
    Metered,
    /// 按张固定价格，人民币计价
    Fixed,
}

impl CurrencyClass {
    pub fn currency_code(self) -> &'static str {
        match self {
            CurrencyClass::Metered => "USD",
            CurrencyClass::Fixed => "CNY",
        }
    }
}

impl fmt::Display for CurrencyClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CurrencyClass::Metered => write!(f, "metered"),
            CurrencyClass::Fixed => write!(f, "fixed"),
        }
    }
}

impl FromStr for CurrencyClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metered" => Ok(CurrencyClass::Metered),
            "fixed" => Ok(CurrencyClass::Fixed),
            _ => Err(()),
        }
    }
}

/// 调用附带的用量信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub latency_ms: Option<i64>,
}

/// 费用汇总（仅用于展示）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    /// 计量部分合计（USD）
    pub metered_total: Decimal,
    /// 固定价部分合计（CNY）
    pub fixed_total: Decimal,
    /// 折算后的参考总价（CNY）
    pub reference_total: Decimal,
    /// 折算所用汇率（CNY / USD）
    pub conversion_rate: Decimal,
}
