// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 外部协作方接口（collaborators）：风格分析、内容分析、提示词合成、
///   图片生成与费用查询的抽象
/// - 费用账本（cost_ledger）：记录费用明细并从明细重算任务合计
pub mod collaborators;
pub mod cost_ledger;
