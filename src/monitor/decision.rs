use chrono::{DateTime, Utc};

use crate::providers::gitlab::{Pipeline, PipelineStatus};

/// Minimal record of the last pipeline a notification was emitted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: u64,
    pub status: PipelineStatus,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn of(pipeline: &Pipeline, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: pipeline.id,
            status: pipeline.status.clone(),
            timestamp,
        }
    }
}

/// Decides whether `current` deserves a notification given the last notified snapshot.
///
/// - No snapshot yet: only failures are announced, so a cold start stays quiet.
/// - A newer pipeline: announced once it reached success or failure.
/// - Same pipeline, new status: failures always, success only straight after running.
/// - Same pipeline, same status: never.
pub fn should_notify(current: &Pipeline, last: Option<&Snapshot>) -> bool {
    let Some(last) = last else {
        return current.status == PipelineStatus::Failed;
    };

    if current.id != last.id {
        return matches!(
            current.status,
            PipelineStatus::Failed | PipelineStatus::Success
        );
    }

    if current.status != last.status {
        return current.status == PipelineStatus::Failed
            || (last.status == PipelineStatus::Running
                && current.status == PipelineStatus::Success);
    }

    false
}
