// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::batch_orchestrator::BatchOrchestrator;
use super::generation_worker::GenerationWorker;
use super::task_runner::TaskRunner;
use crate::queue::job_queue::JobQueue;

/// 工作管理器
pub struct WorkerManager {
    queue: Arc<dyn JobQueue>,
    runner: Arc<TaskRunner>,
    orchestrator: Arc<BatchOrchestrator>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        runner: Arc<TaskRunner>,
        orchestrator: Arc<BatchOrchestrator>,
    ) -> Self {
        Self {
            queue,
            runner,
            orchestrator,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 创建并启动指定数量的工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        for _ in 0..count {
            let worker = GenerationWorker::new(self.runner.clone(), self.orchestrator.clone());
            let queue = self.queue.clone();
            let handle = tokio::spawn(async move {
                worker.run(queue).await;
            });
            self.handles.push(handle);
        }
        info!("Started {} generation workers", count);
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// 等待关闭信号并关闭工作进程
    ///
    /// 监听关闭信号并优雅地关闭所有工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown();
    }

    /// 中止所有工作进程
    pub fn shutdown(&mut self) {
        info!("Shutting down workers...");
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Workers shut down successfully");
    }
}
