// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// 生成任务与批次的提交、查询和重试
pub mod generation_use_case;
