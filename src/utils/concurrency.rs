// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// 有界并发执行
///
/// 同一时刻最多 `limit` 个操作在执行，全部结束后返回，结果按完成顺序排列。
/// 每个操作恰好执行一次，某个操作的失败不会取消其他操作，失败需要在
/// 操作内部自行处理（返回值里带上 `Result` 即可）。`limit` 为 0 时按 1 处理。
pub async fn run_bounded<F, Fut, T>(ops: Vec<F>, limit: usize) -> Vec<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(ops.into_iter().map(|op| op()))
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
