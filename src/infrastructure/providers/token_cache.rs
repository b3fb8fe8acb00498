// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::ensure_success;
use crate::domain::services::collaborators::ProviderError;

/// 剩余有效期低于该值时刷新令牌
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// 有效期（秒）
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// 临时访问令牌缓存
///
/// 由持有它的适配器显式拥有。令牌剩余有效期不足 [`REFRESH_THRESHOLD`]
/// 时在下一次取用前刷新；并发取用时只有一个请求去换取新令牌。
pub struct AccessTokenCache {
    client: reqwest::Client,
    token_url: String,
    api_key: String,
    refresh_threshold: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenCache {
    pub fn new(client: reqwest::Client, token_url: String, api_key: String) -> Self {
        Self::with_threshold(client, token_url, api_key, REFRESH_THRESHOLD)
    }

    pub fn with_threshold(
        client: reqwest::Client,
        token_url: String,
        api_key: String,
        refresh_threshold: Duration,
    ) -> Self {
        Self {
            client,
            token_url,
            api_key,
            refresh_threshold,
            cached: Mutex::new(None),
        }
    }

    /// 取得可用令牌，必要时刷新
    pub async fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at.saturating_duration_since(Instant::now()) > self.refresh_threshold {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// 丢弃缓存的令牌，下次取用时重新换取
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn fetch(&self) -> Result<CachedToken, ProviderError> {
        debug!(url = %self.token_url, "Refreshing access token");
        let response = self
            .client
            .post(&self.token_url)
            .json(&serde_json::json!({ "api_key": self.api_key }))
            .send()
            .await?;
        let body: TokenResponse = ensure_success(response).await?.json().await?;

        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        })
    }
}
