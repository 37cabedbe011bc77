mod client;
mod links;
mod types;

pub use client::GitLabClient;
pub use links::project_pipelines_url;
pub use types::{EnrichedPipeline, Pipeline, PipelineStatus};

#[cfg(test)]
pub use types::{Commit, PipelineUser};
