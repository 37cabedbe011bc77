use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};

use crate::auth::Token;
use crate::config::{Config, Project};
use crate::error::Result;
use crate::providers::gitlab::{GitLabClient, PipelineStatus};

use super::badge::{Badge, BadgeSink};
use super::notifier::{Notification, Notifier};
use super::state::NotifiedState;

/// Outcome of one poll cycle, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Connection unset or no tracked projects
    Skipped,
    Completed {
        /// Projects whose latest pipeline was fetched
        succeeded: usize,
        /// Projects whose fetch failed
        failed: usize,
        /// `(project id, pipeline id)` of every notification emitted
        notified: Vec<(String, u64)>,
        badge: Badge,
    },
}

/// Checks every tracked project, notifies on state changes, and updates the badge.
pub struct Poller {
    client: Option<GitLabClient>,
    projects: Vec<Project>,
    state: NotifiedState,
    notifier: Box<dyn Notifier>,
    badge: Box<dyn BadgeSink>,
    token_override: Option<Token>,
}

impl Poller {
    pub fn new(notifier: Box<dyn Notifier>, badge: Box<dyn BadgeSink>) -> Self {
        Self {
            client: None,
            projects: Vec::new(),
            state: NotifiedState::new(),
            notifier,
            badge,
            token_override: None,
        }
    }

    /// Uses `token` instead of the stored access token on every config reload.
    pub fn with_token_override(mut self, token: Option<Token>) -> Self {
        self.token_override = token;
        self
    }

    /// Refreshes connection and project list from the configuration.
    ///
    /// Notified state survives reloads, including for projects that were
    /// removed and later added back.
    pub fn apply_config(&mut self, config: &Config) -> Result<()> {
        self.client = match config.gitlab.connection_with(self.token_override.as_ref()) {
            Some((url, token)) => Some(GitLabClient::new(url, &token)?),
            None => None,
        };
        self.projects = config.projects.clone();

        debug!(
            "Poller configured: connected={}, projects={}",
            self.client.is_some(),
            self.projects.len()
        );

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.client.is_some() && !self.projects.is_empty()
    }

    /// Runs one full check over all tracked projects.
    ///
    /// Each project is fetched concurrently and independently; a failed fetch is
    /// logged and skipped until the next cycle. The badge is derived from the
    /// same fetch results.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let Some(client) = self.client.as_ref().filter(|_| !self.projects.is_empty()) else {
            debug!("Skipping pipeline check: not configured or no projects");
            return CycleReport::Skipped;
        };

        info!("Checking pipelines for {} projects...", self.projects.len());

        let outcomes = join_all(self.projects.iter().map(|project| async move {
            (project, client.fetch_latest_pipeline(&project.id).await)
        }))
        .await;

        let now = Utc::now();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut notified = Vec::new();
        let mut latest_statuses: Vec<PipelineStatus> = Vec::new();

        for (project, outcome) in outcomes {
            match outcome {
                Ok(Some(pipeline)) => {
                    succeeded += 1;
                    if self.state.observe(&project.id, &pipeline, now) {
                        let notification =
                            Notification::for_pipeline(client.web_url(), project, &pipeline);
                        self.notifier.notify(&notification);
                        info!(
                            "Notified: project {} pipeline #{} {}",
                            project.name, pipeline.id, pipeline.status
                        );
                        notified.push((project.id.clone(), pipeline.id));
                    }
                    latest_statuses.push(pipeline.status);
                }
                Ok(None) => {
                    succeeded += 1;
                    debug!("Project {} has no pipelines", project.name);
                }
                Err(e) => {
                    failed += 1;
                    warn!("Failed to check project {} ({}): {e}", project.name, project.id);
                }
            }
        }

        info!("Pipeline check finished: {succeeded} projects ok, {failed} failed");

        let badge = Badge::from_statuses(&latest_statuses);
        badge.apply(self.badge.as_mut());

        CycleReport::Completed {
            succeeded,
            failed,
            notified,
            badge,
        }
    }
}
