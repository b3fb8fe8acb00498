// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用层模块
///
/// 请求校验与用例编排，不直接依赖具体的存储或外部服务实现
pub mod dto;
pub mod use_cases;
