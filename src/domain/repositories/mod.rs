// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 批量任务仓库（batch_repository）：批次记录、共享分析与聚合计数
/// - 费用仓库（cost_repository）：只追加的费用明细
/// - 存储仓库（storage_repository）：商品图、参考图与结果图
/// - 任务仓库（task_repository）：生成任务的状态与各步产出
pub mod batch_repository;
pub mod cost_repository;
pub mod storage_repository;
pub mod task_repository;
