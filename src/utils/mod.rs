// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
/// 包括有界并发执行、外部调用重试、错误类型和遥测初始化
pub mod concurrency;
pub mod errors;
pub mod retry_policy;
pub mod telemetry;
