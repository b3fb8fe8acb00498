// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 单任务流水线：完整执行、失败后恢复、恢复前置条件校验

use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use styleforge::domain::models::cost::CurrencyClass;
use styleforge::domain::models::task::{Stage, TaskStatus};
use styleforge::domain::repositories::cost_repository::CostRepository;
use styleforge::domain::repositories::storage_repository::ImageStore;
use styleforge::utils::errors::PipelineError;
use styleforge::workers::step_executor::TEMPLATE_MODEL;

use super::helpers::harness::{reference_source, template_source, Harness};

#[tokio::test]
async fn test_reference_task_runs_all_four_stages() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;

    let done = h.runner.run(task.id, Stage::StyleAnalysis).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.current_step, 4);
    assert!(done.style_analysis.is_some());
    assert!(done.content_analysis.is_some());
    assert!(done.generated_prompt.is_some());
    assert_eq!(done.result_images.len(), 1);
    assert!(done.result_images[0].starts_with(&format!("results/{}/", task.id)));
    assert!(done.completed_at.is_some());

    let stored = h.images.get_image(&done.result_images[0]).await.unwrap();
    assert!(stored.is_some());

    let trace = done.model_trace.unwrap();
    assert_eq!(trace.style_analysis.as_deref(), Some("vision-style"));
    assert_eq!(trace.content_analysis.as_deref(), Some("vision-content"));
    assert_eq!(trace.prompt_synthesis.as_deref(), Some("vision-prompt"));
    assert_eq!(trace.image_generation.as_deref(), Some("image-model"));
}

#[tokio::test]
async fn test_costs_recorded_per_call_and_totals_match() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;

    h.runner.run(task.id, Stage::StyleAnalysis).await.unwrap();

    let entries = h.costs.find_by_task_id(task.id).await.unwrap();
    assert_eq!(entries.len(), 4);
    let stages: Vec<i32> = entries.iter().map(|e| e.stage).collect();
    assert_eq!(stages, vec![1, 2, 3, 4]);
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.currency == CurrencyClass::Fixed)
            .count(),
        1
    );

    let reloaded = h.task(task.id).await;
    assert_eq!(reloaded.total_cost.metered, dec!(0.03));
    assert_eq!(reloaded.total_cost.fixed, dec!(0.2));
}

#[tokio::test]
async fn test_failure_at_image_generation_then_resume() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;
    h.providers
        .fail(&task.product_image_key, Stage::ImageGeneration, 1);

    let err = h
        .runner
        .run(task.id, Stage::StyleAnalysis)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::StageFailed {
            stage: Stage::ImageGeneration,
            ..
        }
    ));

    let failed = h.task(task.id).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.failed_step, Some(4));
    assert!(failed.error_message.is_some());
    assert!(failed.style_analysis.is_some());
    assert!(failed.content_analysis.is_some());
    let prompt_before = failed.generated_prompt.clone();
    assert!(prompt_before.is_some());

    let done = h.runner.resume(task.id).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.failed_step, None);
    assert_eq!(done.error_message, None);
    assert_eq!(done.generated_prompt, prompt_before);

    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.providers.content_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.providers.prompt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.providers.image_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cannot_resume_without_predecessor_outputs() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;

    let err = h
        .runner
        .run(task.id, Stage::PromptSynthesis)
        .await
        .unwrap_err();

    assert!(err.is_cannot_resume());
    assert!(err.to_string().starts_with("cannot-resume"));
    match err {
        PipelineError::CannotResume { missing, .. } => {
            assert_eq!(missing, Stage::StyleAnalysis)
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.providers.total_calls(), 0);
    let unchanged = h.task(task.id).await;
    assert_eq!(unchanged.status, TaskStatus::Pending);
    assert_eq!(unchanged.current_step, 0);
}

#[tokio::test]
async fn test_resume_rejects_non_failed_task() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;

    let err = h.runner.resume(task.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotRetryable(id) if id == task.id));
}

#[tokio::test]
async fn test_template_task_skips_style_call() {
    let h = Harness::new().await;
    let task = h.standalone_task(template_source()).await;

    let done = h.runner.run(task.id, Stage::StyleAnalysis).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(h.providers.style_calls.load(Ordering::SeqCst), 0);
    let style = done.style_analysis.unwrap();
    assert_eq!(style.composition, "kitchen");
    assert_eq!(
        done.model_trace.unwrap().style_analysis.as_deref(),
        Some(TEMPLATE_MODEL)
    );

    let entries = h.costs.find_by_task_id(task.id).await.unwrap();
    assert!(entries.iter().all(|e| e.stage != 1));
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn test_cost_lookup_failure_does_not_fail_stage() {
    let h = Harness::new().await;
    h.providers.fail_lookups();
    let task = h.standalone_task(reference_source()).await;

    let done = h.runner.run(task.id, Stage::StyleAnalysis).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    let entries = h.costs.find_by_task_id(task.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].currency, CurrencyClass::Fixed);
}

#[tokio::test]
async fn test_missing_product_image_fails_content_stage() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;
    let mut broken = task.clone();
    broken.product_image_key = "products/missing.png".into();
    h.tasks_update(&broken).await;

    let err = h
        .runner
        .run(task.id, Stage::StyleAnalysis)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::StageFailed {
            stage: Stage::ContentAnalysis,
            ..
        }
    ));
    let failed = h.task(task.id).await;
    assert_eq!(failed.failed_step, Some(2));
    assert!(failed.style_analysis.is_some());
}
