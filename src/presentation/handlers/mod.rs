// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 每个处理器只做参数提取，业务逻辑交给生成用例
pub mod batch_handler;
pub mod task_handler;
