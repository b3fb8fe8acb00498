// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use styleforge::domain::models::batch::{BatchCounts, BatchStatus, BatchTask};
use styleforge::domain::models::style::StyleSource;
use styleforge::domain::models::task::TaskStatus;

fn counts(statuses: &[TaskStatus]) -> BatchCounts {
    BatchCounts::tally(statuses.iter().copied())
}

#[test]
fn test_aggregate_status_from_children() {
    use TaskStatus::*;

    assert_eq!(
        BatchStatus::aggregate(&counts(&[Completed, Completed])),
        BatchStatus::Completed
    );
    assert_eq!(
        BatchStatus::aggregate(&counts(&[Failed, Failed])),
        BatchStatus::Failed
    );
    assert_eq!(
        BatchStatus::aggregate(&counts(&[Completed, Failed, Completed])),
        BatchStatus::PartialFailed
    );
    assert_eq!(
        BatchStatus::aggregate(&counts(&[Completed, GeneratingImage])),
        BatchStatus::Processing
    );
}

#[test]
fn test_apply_counts_sets_completion_time_only_when_terminal() {
    let mut batch = BatchTask::new(
        StyleSource::Reference {
            image_key: "refs/r.png".into(),
            extracted_text: vec![],
        },
        3,
    );

    batch.apply_counts(counts(&[TaskStatus::Completed, TaskStatus::Pending, TaskStatus::Pending]));
    assert_eq!(batch.status, BatchStatus::Processing);
    assert_eq!(batch.completed_count, 1);
    assert!(batch.completed_at.is_none());

    batch.apply_counts(counts(&[
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Completed,
    ]));
    assert_eq!(batch.status, BatchStatus::PartialFailed);
    assert_eq!(batch.failed_count, 1);
    assert!(batch.completed_at.is_some());
    assert_eq!(batch.counts().total, 3);
}
