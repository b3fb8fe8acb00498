// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据传输对象模块
///
/// 定义提交边界的请求结构与校验规则
pub mod batch_request;
pub mod task_request;
