// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 批次编排：共享分析、有界并发、部分失败与只重试失败子任务

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use styleforge::domain::models::analysis::StyleAnalysis;
use styleforge::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use styleforge::domain::models::task::{Stage, TaskStatus};
use styleforge::domain::repositories::batch_repository::BatchRepository;
use styleforge::domain::repositories::cost_repository::CostRepository;
use styleforge::domain::repositories::task_repository::RepositoryError;
use styleforge::infrastructure::repositories::memory::InMemoryBatchRepository;
use styleforge::utils::errors::PipelineError;
use styleforge::workers::batch_orchestrator::{BatchOrchestrator, DEFAULT_BATCH_CONCURRENCY};
use uuid::Uuid;

use super::helpers::harness::{
    product_key, reference_source, template_source, Harness, REFERENCE_KEY,
};

#[tokio::test]
async fn test_partial_failure_then_retry_only_failed_child() {
    let h = Harness::new().await;
    let (batch, children) = h.batch(reference_source(), 5).await;
    h.providers.fail(&product_key(2), Stage::ContentAnalysis, 1);

    let after_run = h.orchestrator.run(batch.id).await.unwrap();

    assert_eq!(after_run.status, BatchStatus::PartialFailed);
    assert_eq!(after_run.completed_count, 4);
    assert_eq!(after_run.failed_count, 1);
    assert_eq!(after_run.total_count, 5);

    let failed = h.task(children[2].id).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.failed_step, Some(2));
    assert!(failed.style_analysis.is_none());

    for (index, child) in children.iter().enumerate() {
        let expected = if index == 2 { 0 } else { 1 };
        assert_eq!(h.providers.prompt_calls_for(&product_key(index)), expected);
        if index != 2 {
            assert_eq!(h.task(child.id).await.status, TaskStatus::Completed);
        }
    }
    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 1);

    let after_retry = h.orchestrator.retry_failed(batch.id).await.unwrap();

    assert_eq!(after_retry.status, BatchStatus::Completed);
    assert_eq!(after_retry.completed_count, 5);
    assert_eq!(after_retry.failed_count, 0);
    assert!(after_retry.completed_at.is_some());

    // 共享分析不重算，只有失败的子任务重跑了 2-4 步
    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.providers.content_calls.load(Ordering::SeqCst), 6);
    assert_eq!(h.providers.image_calls.load(Ordering::SeqCst), 5);
    for index in 0..5 {
        assert_eq!(h.providers.prompt_calls_for(&product_key(index)), 1);
    }

    let retried = h.task(children[2].id).await;
    assert_eq!(retried.status, TaskStatus::Completed);
    assert_eq!(
        retried
            .model_trace
            .unwrap()
            .style_analysis
            .as_deref(),
        Some("vision-style")
    );
}

#[tokio::test]
async fn test_shared_analysis_computed_once_and_stored_on_batch() {
    let h = Harness::new().await;
    let (batch, children) = h.batch(reference_source(), 4).await;

    h.orchestrator.run(batch.id).await.unwrap();
    // 再跑一次，子任务都已终态，不应触发任何分析
    h.orchestrator.run(batch.id).await.unwrap();

    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 1);
    let stored = h.load_batch(batch.id).await;
    let shared = stored.shared_analysis.unwrap();
    assert_eq!(shared.composition, format!("like {}", REFERENCE_KEY));
    assert_eq!(stored.shared_analysis_model.as_deref(), Some("vision-style"));

    for child in &children {
        let child = h.task(child.id).await;
        assert!(child.style_analysis.is_none());
        assert_eq!(child.status, TaskStatus::Completed);
    }

    // 共享分析费用只记到批次序号最小的子任务
    let first = h.costs.find_by_task_id(children[0].id).await.unwrap();
    let second = h.costs.find_by_task_id(children[1].id).await.unwrap();
    assert_eq!(first.iter().filter(|e| e.stage == 1).count(), 1);
    assert_eq!(second.iter().filter(|e| e.stage == 1).count(), 0);
}

#[tokio::test]
async fn test_concurrent_runs_drive_each_child_once() {
    let h = Harness::new().await;
    h.providers.set_delay(Duration::from_millis(20));
    let (batch, _) = h.batch(reference_source(), 3).await;

    let (a, b) = tokio::join!(h.orchestrator.run(batch.id), h.orchestrator.run(batch.id));
    assert_eq!(a.unwrap().status, BatchStatus::Completed);
    assert_eq!(b.unwrap().status, BatchStatus::Completed);

    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.providers.content_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.providers.image_calls.load(Ordering::SeqCst), 3);
    for index in 0..3 {
        assert_eq!(h.providers.prompt_calls_for(&product_key(index)), 1);
    }
}

#[tokio::test]
async fn test_retry_failed_keeps_completed_children_identical() {
    let h = Harness::new().await;
    let (batch, children) = h.batch(reference_source(), 4).await;
    h.providers.fail(&product_key(1), Stage::ImageGeneration, 1);

    let after_run = h.orchestrator.run(batch.id).await.unwrap();
    assert_eq!(after_run.status, BatchStatus::PartialFailed);

    let mut before: Vec<Value> = Vec::new();
    for (index, child) in children.iter().enumerate() {
        if index != 1 {
            before.push(serde_json::to_value(h.task(child.id).await).unwrap());
        }
    }
    let failed = h.task(children[1].id).await;
    assert_eq!(failed.failed_step, Some(4));
    let content_before = serde_json::to_value(&failed.content_analysis).unwrap();
    let prompt_before = failed.generated_prompt.clone();
    let shared_before = serde_json::to_value(&h.load_batch(batch.id).await.shared_analysis).unwrap();

    let after_retry = h.orchestrator.retry_failed(batch.id).await.unwrap();
    assert_eq!(after_retry.status, BatchStatus::Completed);

    let mut after: Vec<Value> = Vec::new();
    for (index, child) in children.iter().enumerate() {
        if index != 1 {
            after.push(serde_json::to_value(h.task(child.id).await).unwrap());
        }
    }
    assert_eq!(before, after);

    // 只重跑第 4 步，之前的产出保持原样
    let retried = h.task(children[1].id).await;
    assert_eq!(retried.status, TaskStatus::Completed);
    assert_eq!(serde_json::to_value(&retried.content_analysis).unwrap(), content_before);
    assert_eq!(retried.generated_prompt, prompt_before);
    assert_eq!(
        serde_json::to_value(&h.load_batch(batch.id).await.shared_analysis).unwrap(),
        shared_before
    );
    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.providers.content_calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.providers.prompt_calls_for(&product_key(1)), 1);
    assert_eq!(h.providers.image_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_children_run_with_bounded_concurrency() {
    let h = Harness::with_concurrency(3).await;
    h.providers.set_delay(Duration::from_millis(30));
    let (batch, _) = h.batch(reference_source(), 8).await;

    let done = h.orchestrator.run(batch.id).await.unwrap();

    assert_eq!(done.status, BatchStatus::Completed);
    let peak = h.providers.peak_concurrency();
    assert!(peak <= 3, "peak concurrency was {peak}");
    assert!(peak >= 2, "children did not overlap, peak was {peak}");
}

#[tokio::test]
async fn test_template_batch_children_start_at_stage_one() {
    let h = Harness::new().await;
    let (batch, children) = h.batch(template_source(), 2).await;

    let done = h.orchestrator.run(batch.id).await.unwrap();

    assert_eq!(done.status, BatchStatus::Completed);
    assert!(h.load_batch(batch.id).await.shared_analysis.is_none());
    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 0);
    for child in &children {
        let child = h.task(child.id).await;
        assert_eq!(child.style_analysis.unwrap().composition, "kitchen");
    }
}

#[tokio::test]
async fn test_shared_analysis_failure_fails_batch() {
    let h = Harness::new().await;
    h.providers.fail(REFERENCE_KEY, Stage::StyleAnalysis, 1);
    let (batch, children) = h.batch(reference_source(), 3).await;

    let err = h.orchestrator.run(batch.id).await.unwrap_err();

    assert!(matches!(err, PipelineError::SharedAnalysis(_)));
    let stored = h.load_batch(batch.id).await;
    assert_eq!(stored.status, BatchStatus::Failed);
    assert!(stored.shared_analysis.is_none());
    assert_eq!(h.providers.content_calls.load(Ordering::SeqCst), 0);
    for child in &children {
        assert_eq!(h.task(child.id).await.status, TaskStatus::Pending);
    }

    // 重新运行整批时重新计算共享分析
    let done = h.orchestrator.run(batch.id).await.unwrap();
    assert_eq!(done.status, BatchStatus::Completed);
    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_all_children_failed_marks_batch_failed() {
    let h = Harness::new().await;
    let (batch, _) = h.batch(template_source(), 2).await;
    h.providers.fail(&product_key(0), Stage::ImageGeneration, 1);
    h.providers.fail(&product_key(1), Stage::PromptSynthesis, 1);

    let done = h.orchestrator.run(batch.id).await.unwrap();

    assert_eq!(done.status, BatchStatus::Failed);
    assert_eq!(done.failed_count, 2);
    assert_eq!(done.completed_count, 0);
}

#[tokio::test]
async fn test_retry_failed_without_failures_refreshes_stale_status() {
    let h = Harness::new().await;
    let (batch, _) = h.batch(template_source(), 2).await;
    h.orchestrator.run(batch.id).await.unwrap();
    h.batches
        .update_status(batch.id, BatchStatus::Processing)
        .await
        .unwrap();
    let calls = h.providers.total_calls();

    let refreshed = h.orchestrator.retry_failed(batch.id).await.unwrap();

    assert_eq!(refreshed.status, BatchStatus::Completed);
    assert_eq!(refreshed.completed_count, 2);
    assert_eq!(h.load_batch(batch.id).await.status, BatchStatus::Completed);
    assert_eq!(h.providers.total_calls(), calls);
}

#[tokio::test]
async fn test_run_child_refreshes_batch_aggregate() {
    let h = Harness::new().await;
    let (batch, children) = h.batch(reference_source(), 3).await;
    h.providers.fail(&product_key(1), Stage::ContentAnalysis, 1);
    h.orchestrator.run(batch.id).await.unwrap();

    let mut child = h.task(children[1].id).await;
    child.requeue().unwrap();
    h.tasks_update(&child).await;

    let done = h
        .orchestrator
        .run_child(batch.id, child.id, Stage::ContentAnalysis)
        .await
        .unwrap();

    assert_eq!(done.status, BatchStatus::Completed);
    assert_eq!(done.completed_count, 3);
    assert_eq!(done.failed_count, 0);
    assert_eq!(h.load_batch(batch.id).await.status, BatchStatus::Completed);

    // 子任务已不是 Pending，再次执行只重新统计
    let calls = h.providers.total_calls();
    h.orchestrator
        .run_child(batch.id, child.id, Stage::ContentAnalysis)
        .await
        .unwrap();
    assert_eq!(h.providers.total_calls(), calls);
}

/// 记录每次写入的批次状态
struct StatusRecorder {
    inner: Arc<InMemoryBatchRepository>,
    statuses: Mutex<Vec<BatchStatus>>,
}

impl StatusRecorder {
    fn written(&self) -> Vec<BatchStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchRepository for StatusRecorder {
    async fn create(&self, batch: &BatchTask) -> Result<BatchTask, RepositoryError> {
        self.inner.create(batch).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BatchTask>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn update_status(&self, id: Uuid, status: BatchStatus) -> Result<(), RepositoryError> {
        self.statuses.lock().unwrap().push(status);
        self.inner.update_status(id, status).await
    }

    async fn save_shared_analysis(
        &self,
        id: Uuid,
        analysis: &StyleAnalysis,
        model: &str,
    ) -> Result<(), RepositoryError> {
        self.inner.save_shared_analysis(id, analysis, model).await
    }

    async fn update_counts(
        &self,
        id: Uuid,
        counts: &BatchCounts,
        status: BatchStatus,
    ) -> Result<(), RepositoryError> {
        self.statuses.lock().unwrap().push(status);
        self.inner.update_counts(id, counts, status).await
    }
}

#[tokio::test]
async fn test_rerun_of_settled_batch_never_leaves_terminal_status() {
    let h = Harness::new().await;
    let (batch, _) = h.batch(reference_source(), 2).await;
    h.orchestrator.run(batch.id).await.unwrap();

    let recorder = Arc::new(StatusRecorder {
        inner: h.batches.clone(),
        statuses: Mutex::new(Vec::new()),
    });
    let orchestrator = BatchOrchestrator::new(
        recorder.clone(),
        h.tasks.clone(),
        h.runner.clone(),
        h.executor.clone(),
        DEFAULT_BATCH_CONCURRENCY,
    );
    let calls = h.providers.total_calls();

    let again = orchestrator.run(batch.id).await.unwrap();

    assert_eq!(again.status, BatchStatus::Completed);
    assert_eq!(recorder.written(), vec![BatchStatus::Completed]);
    assert_eq!(h.providers.total_calls(), calls);
}

#[tokio::test]
async fn test_retry_failed_without_failures_is_noop() {
    let h = Harness::new().await;
    let (batch, _) = h.batch(template_source(), 2).await;
    h.orchestrator.run(batch.id).await.unwrap();
    let calls = h.providers.total_calls();

    let again = h.orchestrator.retry_failed(batch.id).await.unwrap();

    assert_eq!(again.status, BatchStatus::Completed);
    assert_eq!(h.providers.total_calls(), calls);
}

#[tokio::test]
async fn test_unknown_batch_is_reported() {
    let h = Harness::new().await;
    let missing = uuid::Uuid::new_v4();

    let err = h.orchestrator.run(missing).await.unwrap_err();
    assert!(matches!(err, PipelineError::BatchNotFound(id) if id == missing));
}
