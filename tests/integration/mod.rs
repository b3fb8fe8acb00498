// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod batch_orchestrator_test;
pub mod helpers;
pub mod routes_test;
pub mod task_runner_test;
