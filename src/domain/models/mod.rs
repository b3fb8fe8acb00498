// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 生成任务（task）：一张商品图的 4 步流水线
/// - 批量任务（batch）：共享风格来源的一组生成任务
/// - 费用明细（cost）：每次外部付费调用的记录
/// - 分析结果（analysis）：风格分析与内容分析的结构化产出
/// - 风格来源（style）：参考图或预设模板
pub mod analysis;
pub mod batch;
pub mod cost;
pub mod style;
pub mod task;
