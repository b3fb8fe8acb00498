// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use styleforge::domain::models::analysis::{ContentAnalysis, StyleAnalysis};
use styleforge::domain::models::style::StyleSource;
use styleforge::domain::models::task::{GenerationTask, ModelTrace, Stage, TaskStatus};
use uuid::Uuid;

fn reference() -> StyleSource {
    StyleSource::Reference {
        image_key: "refs/r.png".into(),
        extracted_text: vec![],
    }
}

fn task() -> GenerationTask {
    GenerationTask::new(reference(), "products/p.png".into(), "default".into(), None)
}

#[test]
fn test_task_lifecycle_happy_path() {
    // Given: 新创建的任务
    let mut task = task();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.current_step, 0);
    assert_eq!(task.total_steps, 4);

    // When: 依次进入四个阶段
    let expected = [
        TaskStatus::AnalyzingReference,
        TaskStatus::AnalyzingContent,
        TaskStatus::GeneratingPrompt,
        TaskStatus::GeneratingImage,
    ];
    for (stage, status) in Stage::ALL.into_iter().zip(expected) {
        task.enter_stage(stage);
        assert_eq!(task.status, status);
        assert_eq!(task.current_step, stage.number());
    }

    // Then: 完成后附带模型记录
    let mut trace = ModelTrace::default();
    trace.record(Stage::ImageGeneration, "image-model");
    task.complete(trace).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.current_step, 4);
    assert!(task.completed_at.is_some());
    assert_eq!(
        task.model_trace.unwrap().image_generation.as_deref(),
        Some("image-model")
    );
}

#[test]
fn test_complete_requires_image_stage() {
    let mut task = task();
    task.enter_stage(Stage::PromptSynthesis);
    assert!(task.complete(ModelTrace::default()).is_err());
}

#[test]
fn test_failure_keeps_outputs_and_resumes_at_failed_step() {
    let mut task = task();
    task.style_analysis = Some(StyleAnalysis::default());
    task.content_analysis = Some(ContentAnalysis::default());
    task.enter_stage(Stage::PromptSynthesis);
    task.fail_at(Stage::PromptSynthesis, "timeout after 60s");

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.failed_step, Some(3));
    assert_eq!(task.resume_stage(Stage::StyleAnalysis), Stage::PromptSynthesis);
    assert_eq!(task.first_missing_before(Stage::PromptSynthesis, false), None);

    task.requeue().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.failed_step, None);
    assert_eq!(task.error_message, None);
    assert!(task.content_analysis.is_some());
}

#[test]
fn test_requeue_only_from_failed() {
    let mut task = task();
    assert!(task.requeue().is_err());
}

#[test]
fn test_first_missing_before_reports_earliest_gap() {
    let mut task = task();
    task.content_analysis = Some(ContentAnalysis::default());

    assert_eq!(
        task.first_missing_before(Stage::ImageGeneration, false),
        Some(Stage::StyleAnalysis)
    );
    assert_eq!(task.first_missing_before(Stage::StyleAnalysis, false), None);
}

#[test]
fn test_batch_reference_child_reads_shared_analysis() {
    let child = task().in_batch(Uuid::new_v4(), 0);

    assert!(child.uses_shared_analysis());
    assert_eq!(child.min_start_stage(), Stage::ContentAnalysis);
    assert!(!child.has_output(Stage::StyleAnalysis, false));
    assert!(child.has_output(Stage::StyleAnalysis, true));
    assert_eq!(
        child.next_stage_to_run(child.min_start_stage(), true),
        Some(Stage::ContentAnalysis)
    );
    // 失败步骤缺失时从最小起始阶段恢复
    assert_eq!(child.resume_stage(child.min_start_stage()), Stage::ContentAnalysis);
}

#[test]
fn test_template_batch_child_starts_at_stage_one() {
    let template = StyleSource::Template {
        template_id: "t".into(),
        scene_type: "outdoor".into(),
        scene_description: "beach".into(),
    };
    let child = GenerationTask::new(template, "p.png".into(), "default".into(), None)
        .in_batch(Uuid::new_v4(), 3);

    assert!(!child.uses_shared_analysis());
    assert_eq!(child.min_start_stage(), Stage::StyleAnalysis);
    assert_eq!(child.batch_index, Some(3));
}

#[test]
fn test_stage_numbering() {
    assert_eq!(Stage::from_number(2), Some(Stage::ContentAnalysis));
    assert_eq!(Stage::from_number(5), None);
    assert_eq!(Stage::ImageGeneration.next(), None);
    assert_eq!(
        Stage::PromptSynthesis.through_last().collect::<Vec<_>>(),
        vec![Stage::PromptSynthesis, Stage::ImageGeneration]
    );
    assert_eq!(Stage::ContentAnalysis.to_string(), "content_analysis(2)");
}

#[test]
fn test_status_string_round_trip_for_storage() {
    for status in [TaskStatus::Pending, TaskStatus::GeneratingPrompt, TaskStatus::Failed] {
        assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
    }
    assert!("running".parse::<TaskStatus>().is_err());
}
