use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipewatchError {
    #[error("GitLab URL and access token are not configured")]
    NotConfigured,

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Project ID should be numeric: {0}")]
    InvalidProjectId(String),

    #[error("Project {0} is already tracked")]
    DuplicateProject(String),

    #[error("Cannot access project {0}, check the project ID or token permissions")]
    ProjectInaccessible(String),

    #[error("Project {0} is not tracked")]
    UnknownProject(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipewatchError>;
