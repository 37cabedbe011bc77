//! Interactive pipeline listing for a single project.

mod filter;
mod render;

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use log::debug;

use crate::error::Result;
use crate::providers::gitlab::{EnrichedPipeline, GitLabClient};

pub use filter::filter_pipelines;
pub use render::render_pipelines;

/// Pipelines shown per refresh.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Fetches and enriches pipeline lists. Only one refresh runs at a time.
pub struct Viewer {
    client: GitLabClient,
    busy: AtomicBool,
}

/// Clears the busy flag when the refresh finishes, including on error.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Viewer {
    pub fn new(client: GitLabClient) -> Self {
        Self {
            client,
            busy: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Fetches the latest pipelines of a project with their commits.
    ///
    /// Returns `Ok(None)` without doing anything if a refresh is already in flight.
    pub async fn refresh(&self, project_id: &str, limit: usize) -> Result<Option<Vec<EnrichedPipeline>>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh already in progress, ignoring request");
            return Ok(None);
        }
        let _guard = BusyGuard(&self.busy);

        let pipelines = self.client.fetch_pipeline_page(project_id, limit).await?;

        // One commit request per row, all in flight together.
        let enriched = join_all(pipelines.into_iter().map(|pipeline| async move {
            let commit = self.client.fetch_commit(project_id, &pipeline.sha).await;
            EnrichedPipeline { pipeline, commit }
        }))
        .await;

        Ok(Some(enriched))
    }
}
