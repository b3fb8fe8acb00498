// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 流水线执行核心与后台工作器：
/// - 步骤执行器（step_executor）：单个阶段的外部调用与费用结算
/// - 任务状态机（task_runner）：顺序执行各阶段、失败记录与恢复
/// - 批次编排器（batch_orchestrator）：共享分析、有界并发与状态聚合
/// - 生成工作器与管理器：从作业队列取出作业并分派
pub mod batch_orchestrator;
pub mod generation_worker;
pub mod manager;
pub mod step_executor;
pub mod task_runner;
