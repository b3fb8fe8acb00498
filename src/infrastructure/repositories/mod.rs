// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的具体实现：
/// SeaORM 数据库实现，以及开发和测试使用的内存实现
pub mod batch_repo_impl;
pub mod cost_repo_impl;
pub mod memory;
pub mod task_repo_impl;
