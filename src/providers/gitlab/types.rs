use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a GitLab pipeline as reported by the REST API.
///
/// Statuses this tool does not reason about (`created`, `manual`, `skipped`, ...)
/// are kept verbatim in [`PipelineStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PipelineStatus {
    Success,
    Failed,
    Running,
    Pending,
    Canceled,
    Other(String),
}

impl PipelineStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::Pending => "pending",
            Self::Canceled => "canceled",
            Self::Other(raw) => raw,
        }
    }

    /// Human-readable label used in notifications and tables.
    pub fn label(&self) -> &str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Running => "Running",
            Self::Pending => "Pending",
            Self::Canceled => "Canceled",
            Self::Other(raw) => raw,
        }
    }

    /// Freedesktop icon name for desktop notifications.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Success => "emblem-default",
            Self::Failed => "dialog-error",
            Self::Running => "system-run",
            Self::Pending => "appointment-soon",
            Self::Canceled => "process-stop",
            Self::Other(_) => "dialog-information",
        }
    }
}

impl From<String> for PipelineStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "running" => Self::Running,
            "pending" => Self::Pending,
            "canceled" => Self::Canceled,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for PipelineStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<PipelineStatus> for String {
    fn from(value: PipelineStatus) -> Self {
        match value {
            PipelineStatus::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GitLab CI/CD pipeline, as returned by `GET /projects/:id/pipelines`.
///
/// The list endpoint omits `duration` and `user` on most GitLab versions,
/// so both are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub status: PipelineStatus,
    /// Branch or tag the pipeline ran for
    #[serde(rename = "ref", default)]
    pub ref_: String,
    #[serde(default)]
    pub sha: String,
    pub created_at: DateTime<Utc>,
    /// Total duration in seconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// User who triggered the pipeline
    #[serde(default)]
    pub user: Option<PipelineUser>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineUser {
    #[serde(default)]
    pub name: String,
}

/// Commit details used to enrich pipeline rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_name: String,
}

/// Display metadata for a project, fetched when it is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path_with_namespace: String,
}

/// A pipeline together with its (best-effort) commit details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedPipeline {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub commit: Option<Commit>,
}
