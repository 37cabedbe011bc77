use log::debug;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{PipewatchError, Result};

use super::types::{Commit, Pipeline, ProjectInfo};

const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Read-only wrapper over the GitLab REST v4 endpoints this tool uses.
///
/// Every request targets the configured instance and carries the access token
/// as a `PRIVATE-TOKEN` header. No retries and no caching: a failed request is
/// simply retried by the caller's next refresh.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    web_url: String,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: &Token) -> Result<Self> {
        let mut token_value = HeaderValue::from_str(token.as_str())
            .map_err(|e| PipewatchError::Config(format!("Invalid access token: {e}")))?;
        token_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(PRIVATE_TOKEN_HEADER, token_value);

        let client = Client::builder()
            .user_agent(concat!("pipewatch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| PipewatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        let web_url = base_url.trim_end_matches('/').to_string();

        let api_url = Url::parse(&format!("{web_url}/"))
            .map_err(|e| PipewatchError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| PipewatchError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            web_url,
        })
    }

    /// Instance base URL without trailing slash, for building web links.
    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    /// Construct `.../api/v4/projects/{id}/{tail...}`, percent-encoding each segment.
    fn project_url(&self, project_id: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| PipewatchError::Config(format!("Invalid API base URL: {}", self.api_url)))?
            .pop_if_empty()
            .push("projects")
            .push(project_id)
            .extend(tail);
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Response> {
        debug!("GET {url}");

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipewatchError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        Ok(self.get(url, query).await?.json().await?)
    }

    /// Fetches up to `limit` most recent pipelines, newest first.
    pub async fn fetch_pipeline_page(&self, project_id: &str, limit: usize) -> Result<Vec<Pipeline>> {
        let url = self.project_url(project_id, &["pipelines"])?;
        let query = [
            ("per_page", limit.to_string()),
            ("sort", "desc".to_string()),
        ];

        let mut pipelines: Vec<Pipeline> = self.get_json(url, &query).await?;
        pipelines.truncate(limit);

        debug!("Fetched {} pipelines for project {project_id}", pipelines.len());

        Ok(pipelines)
    }

    /// Fetches the most recent pipeline, or `None` when the project has none.
    pub async fn fetch_latest_pipeline(&self, project_id: &str) -> Result<Option<Pipeline>> {
        Ok(self
            .fetch_pipeline_page(project_id, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Best-effort commit lookup. Any failure yields `None`.
    pub async fn fetch_commit(&self, project_id: &str, sha: &str) -> Option<Commit> {
        let url = self
            .project_url(project_id, &["repository", "commits", sha])
            .ok()?;

        match self.get_json(url, &[]).await {
            Ok(commit) => Some(commit),
            Err(e) => {
                debug!("Commit {sha} unavailable for project {project_id}: {e}");
                None
            }
        }
    }

    /// True iff the project detail endpoint answers with a 2xx status.
    pub async fn validate_project(&self, project_id: &str) -> bool {
        let Ok(url) = self.project_url(project_id, &[]) else {
            return false;
        };

        match self.get(url, &[]).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Project {project_id} is not accessible: {e}");
                false
            }
        }
    }

    pub async fn fetch_project_info(&self, project_id: &str) -> Option<ProjectInfo> {
        let url = self.project_url(project_id, &[]).ok()?;

        match self.get_json(url, &[]).await {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Failed to fetch project info for {project_id}: {e}");
                None
            }
        }
    }
}
