use console::{style, StyledObject};
use std::fmt::Display;

use crate::providers::gitlab::PipelineStatus;

pub fn bright(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn cyan(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

/// Failed pipelines, the alert badge.
pub fn alert(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn warning(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

/// Green check mark prefixing completed actions.
pub fn done_mark() -> StyledObject<&'static str> {
    style("✓").bright().green()
}

/// Colors `text` after a pipeline status, matching the table colors.
pub fn status_styled(status: &PipelineStatus, text: impl Display) -> StyledObject<String> {
    let styled = style(text.to_string()).bright();
    match status {
        PipelineStatus::Success => styled.green(),
        PipelineStatus::Failed => styled.red(),
        PipelineStatus::Running => styled.blue(),
        PipelineStatus::Pending => styled.yellow(),
        PipelineStatus::Canceled | PipelineStatus::Other(_) => styled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styling_keeps_text() {
        let styled = status_styled(&PipelineStatus::Failed, "GitLab Pipeline Failed");
        assert_eq!(styled.force_styling(false).to_string(), "GitLab Pipeline Failed");
        assert_eq!(done_mark().force_styling(false).to_string(), "✓");
    }
}
