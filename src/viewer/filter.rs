use crate::providers::gitlab::{EnrichedPipeline, PipelineStatus};

/// Keeps pipelines matching the status filter and the free-text search.
///
/// The search is case-insensitive and looks at the ref, commit message, commit
/// author and triggering user. Input order is preserved.
pub fn filter_pipelines<'a>(
    pipelines: &'a [EnrichedPipeline],
    search_term: &str,
    status_filter: Option<&PipelineStatus>,
) -> Vec<&'a EnrichedPipeline> {
    let search_term = search_term.trim().to_lowercase();

    pipelines
        .iter()
        .filter(|p| status_filter.map_or(true, |status| &p.pipeline.status == status))
        .filter(|p| search_term.is_empty() || searchable_text(p).contains(&search_term))
        .collect()
}

fn searchable_text(enriched: &EnrichedPipeline) -> String {
    let commit = enriched.commit.as_ref();
    [
        enriched.pipeline.ref_.as_str(),
        commit.map_or("", |c| c.message.as_str()),
        commit.map_or("", |c| c.author_name.as_str()),
        enriched
            .pipeline
            .user
            .as_ref()
            .map_or("", |u| u.name.as_str()),
    ]
    .join(" ")
    .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::gitlab::{Commit, Pipeline, PipelineUser};
    use chrono::Utc;

    fn enriched(id: u64, status: PipelineStatus, ref_: &str, commit: Option<(&str, &str)>) -> EnrichedPipeline {
        EnrichedPipeline {
            pipeline: Pipeline {
                id,
                status,
                ref_: ref_.to_string(),
                sha: format!("sha{id}"),
                created_at: Utc::now(),
                duration: None,
                user: Some(PipelineUser {
                    name: "Release Bot".to_string(),
                }),
                web_url: None,
            },
            commit: commit.map(|(message, author)| Commit {
                short_id: String::new(),
                title: message.to_string(),
                message: message.to_string(),
                author_name: author.to_string(),
            }),
        }
    }

    fn sample() -> Vec<EnrichedPipeline> {
        vec![
            enriched(3, PipelineStatus::Failed, "main", Some(("Fix Login redirect", "Jane Doe"))),
            enriched(2, PipelineStatus::Success, "feature/search", Some(("Add search", "John Roe"))),
            enriched(1, PipelineStatus::Running, "main", None),
        ]
    }

    fn ids(filtered: &[&EnrichedPipeline]) -> Vec<u64> {
        filtered.iter().map(|p| p.pipeline.id).collect()
    }

    #[test]
    fn test_no_filters_returns_everything_in_order() {
        let pipelines = sample();
        assert_eq!(ids(&filter_pipelines(&pipelines, "", None)), vec![3, 2, 1]);
    }

    #[test]
    fn test_status_filter() {
        let pipelines = sample();
        let filtered = filter_pipelines(&pipelines, "", Some(&PipelineStatus::Failed));
        assert_eq!(ids(&filtered), vec![3]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let pipelines = sample();
        assert_eq!(ids(&filter_pipelines(&pipelines, "LOGIN", None)), vec![3]);
        assert_eq!(ids(&filter_pipelines(&pipelines, "roe", None)), vec![2]);
        assert_eq!(ids(&filter_pipelines(&pipelines, "feature/", None)), vec![2]);
        assert_eq!(ids(&filter_pipelines(&pipelines, "release bot", None)), vec![3, 2, 1]);
    }

    #[test]
    fn test_missing_commit_still_matches_ref() {
        let pipelines = sample();
        let filtered = filter_pipelines(&pipelines, "  main ", Some(&PipelineStatus::Running));
        assert_eq!(ids(&filtered), vec![1]);
    }

    #[test]
    fn test_search_and_status_combine() {
        let pipelines = sample();
        let filtered = filter_pipelines(&pipelines, "main", Some(&PipelineStatus::Success));
        assert!(filtered.is_empty());
    }
}
