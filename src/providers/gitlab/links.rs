/// Builds the web URL of a project's pipeline list.
///
/// # Arguments
///
/// * `base_url` - GitLab instance base URL (e.g., <https://gitlab.com>)
/// * `project_path` - Project path (e.g., "group/project") or numeric ID
///
/// # Returns
///
/// Clickable URL (e.g., <https://gitlab.com/group/project/-/pipelines>)
pub fn project_pipelines_url(base_url: &str, project_path: &str) -> String {
    format!("{}/{project_path}/-/pipelines", base_url.trim_end_matches('/'))
}
