use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::providers::gitlab::Pipeline;

use super::decision::{should_notify, Snapshot};

/// Last notified pipeline per project, kept in memory for the watcher's lifetime.
///
/// Snapshots are only written when a notification fires, so later checks are
/// compared against the last *notified* state rather than the last one seen.
/// They are never dropped, not even when a project stops being tracked.
#[derive(Debug, Default)]
pub struct NotifiedState {
    snapshots: HashMap<String, Snapshot>,
}

impl NotifiedState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn get(&self, project_id: &str) -> Option<&Snapshot> {
        self.snapshots.get(project_id)
    }

    /// Applies the notification rule to `pipeline` and records it on a positive decision.
    pub fn observe(&mut self, project_id: &str, pipeline: &Pipeline, now: DateTime<Utc>) -> bool {
        let notify = should_notify(pipeline, self.snapshots.get(project_id));
        if notify {
            self.snapshots
                .insert(project_id.to_string(), Snapshot::of(pipeline, now));
        }
        notify
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.snapshots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::gitlab::PipelineStatus;

    fn pipeline(id: u64, status: PipelineStatus) -> Pipeline {
        Pipeline {
            id,
            status,
            ref_: "main".to_string(),
            sha: String::new(),
            created_at: Utc::now(),
            duration: None,
            user: None,
            web_url: None,
        }
    }

    #[test]
    fn test_failed_on_cold_start_records_snapshot() {
        let mut state = NotifiedState::new();

        assert!(state.observe("42", &pipeline(10, PipelineStatus::Failed), Utc::now()));

        let snapshot = state.get("42").unwrap();
        assert_eq!(snapshot.id, 10);
        assert_eq!(snapshot.status, PipelineStatus::Failed);
    }

    #[test]
    fn test_negative_decision_leaves_snapshot_untouched() {
        let mut state = NotifiedState::new();
        assert!(!state.observe("42", &pipeline(10, PipelineStatus::Running), Utc::now()));
        assert!(state.get("42").is_none());

        assert!(state.observe("42", &pipeline(11, PipelineStatus::Failed), Utc::now()));
        assert!(!state.observe("42", &pipeline(12, PipelineStatus::Running), Utc::now()));
        assert_eq!(state.get("42").unwrap().id, 11);
    }

    #[test]
    fn test_repeated_observation_does_not_renotify() {
        let mut state = NotifiedState::new();
        let failed = pipeline(10, PipelineStatus::Failed);

        assert!(state.observe("42", &failed, Utc::now()));
        assert!(!state.observe("42", &failed, Utc::now()));
        assert!(!state.observe("42", &failed, Utc::now()));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_renewed_failure_with_new_id_notifies_again() {
        let mut state = NotifiedState::new();

        assert!(state.observe("42", &pipeline(1, PipelineStatus::Failed), Utc::now()));
        assert!(!state.observe("42", &pipeline(2, PipelineStatus::Running), Utc::now()));
        assert!(state.observe("42", &pipeline(3, PipelineStatus::Failed), Utc::now()));
    }

    #[test]
    fn test_projects_are_tracked_independently() {
        let mut state = NotifiedState::new();
        assert!(state.observe("1", &pipeline(10, PipelineStatus::Failed), Utc::now()));
        assert!(state.observe("2", &pipeline(10, PipelineStatus::Failed), Utc::now()));
        assert_eq!(state.len(), 2);

        assert!(!state.observe("1", &pipeline(10, PipelineStatus::Failed), Utc::now()));
        assert!(state.observe("2", &pipeline(11, PipelineStatus::Success), Utc::now()));
        assert_eq!(state.get("1").unwrap().id, 10);
        assert_eq!(state.get("2").unwrap().id, 11);
    }
}
