// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ensure_success, ApiAuth};
use crate::domain::models::cost::{CostMetrics, CurrencyClass};
use crate::domain::services::collaborators::{CallCost, CostLookup, ProviderError};

#[derive(Debug, Deserialize)]
struct GenerationStatsResponse {
    data: GenerationStats,
}

#[derive(Debug, Deserialize)]
struct GenerationStats {
    total_cost: Decimal,
    #[serde(default)]
    tokens_prompt: Option<i64>,
    #[serde(default)]
    tokens_completion: Option<i64>,
    /// 毫秒
    #[serde(default)]
    latency: Option<i64>,
}

/// 计量费用查询
///
/// `GET {base_url}/generation?id={call_id}`，返回美元计价的计量费用
pub struct HttpCostLookup {
    client: reqwest::Client,
    base_url: String,
    auth: ApiAuth,
}

impl HttpCostLookup {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, auth: ApiAuth) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }
}

#[async_trait]
impl CostLookup for HttpCostLookup {
    async fn lookup(&self, call_id: &str) -> Result<CallCost, ProviderError> {
        let request = self
            .client
            .get(format!("{}/generation", self.base_url))
            .query(&[("id", call_id)]);
        let response = self.auth.apply(request).await?.send().await?;
        let body: GenerationStatsResponse = ensure_success(response).await?.json().await?;

        Ok(CallCost {
            amount: body.data.total_cost,
            currency: CurrencyClass::Metered,
            metrics: CostMetrics {
                prompt_tokens: body.data.tokens_prompt,
                completion_tokens: body.data.tokens_completion,
                latency_ms: body.data.latency,
            },
        })
    }
}
