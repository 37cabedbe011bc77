use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color as TableColor};

use crate::output::{create_cyan_header, create_table};
use crate::providers::gitlab::{EnrichedPipeline, PipelineStatus};

const COMMIT_TITLE_WIDTH: usize = 60;

/// Renders pipelines as a table, newest first as given.
pub fn render_pipelines(pipelines: &[&EnrichedPipeline], now: DateTime<Utc>) -> String {
    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Status", "Pipeline", "Ref", "Commit", "Author", "Created", "Duration",
    ]));

    for enriched in pipelines {
        let pipeline = &enriched.pipeline;
        let commit = enriched.commit.as_ref();

        let author = commit
            .map(|c| c.author_name.as_str())
            .filter(|name| !name.is_empty())
            .or_else(|| pipeline.user.as_ref().map(|u| u.name.as_str()))
            .unwrap_or("-");

        table.add_row(vec![
            status_cell(&pipeline.status),
            Cell::new(format!("#{}", pipeline.id)),
            Cell::new(&pipeline.ref_),
            Cell::new(commit.map_or_else(|| "-".to_string(), |c| commit_title(&c.message))),
            Cell::new(author),
            Cell::new(format_time_ago(pipeline.created_at, now)),
            Cell::new(format_duration(pipeline.duration).unwrap_or_default()),
        ]);
    }

    table.to_string()
}

fn status_cell(status: &PipelineStatus) -> Cell {
    let cell = Cell::new(status.label());
    match status {
        PipelineStatus::Success => cell.fg(TableColor::Green),
        PipelineStatus::Failed => cell.fg(TableColor::Red),
        PipelineStatus::Running => cell.fg(TableColor::Blue),
        PipelineStatus::Pending => cell.fg(TableColor::Yellow),
        PipelineStatus::Canceled | PipelineStatus::Other(_) => cell.fg(TableColor::DarkGrey),
    }
}

/// First line of a commit message, truncated for table display.
fn commit_title(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= COMMIT_TITLE_WIDTH {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(COMMIT_TITLE_WIDTH - 1).collect();
    format!("{truncated}…")
}

pub fn format_time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);

    if elapsed.num_days() > 0 {
        format!("{}d ago", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_minutes() > 0 {
        format!("{}m ago", elapsed.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// `None` when the duration is unknown or zero.
pub fn format_duration(seconds: Option<u64>) -> Option<String> {
    let seconds = seconds.filter(|&s| s > 0)?;
    let (minutes, seconds) = (seconds / 60, seconds % 60);

    Some(if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_time_ago() {
        let now = Utc::now();
        assert_eq!(format_time_ago(now - Duration::seconds(30), now), "just now");
        assert_eq!(format_time_ago(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_time_ago(now - Duration::minutes(125), now), "2h ago");
        assert_eq!(format_time_ago(now - Duration::hours(50), now), "2d ago");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(312)).as_deref(), Some("5m 12s"));
        assert_eq!(format_duration(Some(45)).as_deref(), Some("45s"));
        assert_eq!(format_duration(Some(0)), None);
        assert_eq!(format_duration(None), None);
    }

    #[test]
    fn test_commit_title_uses_first_line() {
        assert_eq!(commit_title("Fix login\n\nLong body"), "Fix login");
        let long = "x".repeat(80);
        assert_eq!(commit_title(&long).chars().count(), COMMIT_TITLE_WIDTH);
    }
}
