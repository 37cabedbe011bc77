use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;

use crate::output::{alert, cyan, dim};
use crate::providers::gitlab::PipelineStatus;

pub const ALERT_COLOR: &str = "#dc2626";
pub const NEUTRAL_COLOR: &str = "#2563eb";
pub const DEFAULT_TOOLTIP: &str = "GitLab Pipeline Monitor";

/// Aggregate indicator over the latest pipeline of every tracked project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    /// Number of projects whose latest pipeline failed
    Failed(usize),
    /// Number of projects whose latest pipeline is running
    Running(usize),
    Clear,
}

impl Badge {
    /// Failures take precedence over running pipelines.
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a PipelineStatus>) -> Self {
        let (failed, running) =
            statuses
                .into_iter()
                .fold((0, 0), |(failed, running), status| match status {
                    PipelineStatus::Failed => (failed + 1, running),
                    PipelineStatus::Running => (failed, running + 1),
                    _ => (failed, running),
                });

        if failed > 0 {
            Self::Failed(failed)
        } else if running > 0 {
            Self::Running(running)
        } else {
            Self::Clear
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Failed(n) | Self::Running(n) => n.to_string(),
            Self::Clear => String::new(),
        }
    }

    pub fn color(&self) -> Option<&'static str> {
        match self {
            Self::Failed(_) => Some(ALERT_COLOR),
            Self::Running(_) => Some(NEUTRAL_COLOR),
            Self::Clear => None,
        }
    }

    pub fn tooltip(&self) -> String {
        match self {
            Self::Failed(1) => "1 project has a failed pipeline".to_string(),
            Self::Failed(n) => format!("{n} projects have failed pipelines"),
            Self::Running(1) => "1 project has a running pipeline".to_string(),
            Self::Running(n) => format!("{n} projects have running pipelines"),
            Self::Clear => DEFAULT_TOOLTIP.to_string(),
        }
    }

    pub fn apply(&self, sink: &mut dyn BadgeSink) {
        sink.set_text(&self.text());
        if let Some(color) = self.color() {
            sink.set_color(color);
        }
        sink.set_tooltip(&self.tooltip());
    }
}

/// Surface the badge is rendered to. The three calls form one update.
pub trait BadgeSink: Send {
    fn set_text(&mut self, text: &str);
    fn set_color(&mut self, color: &str);
    fn set_tooltip(&mut self, tooltip: &str);
}

/// Prints the badge to stderr whenever the tooltip (the last call of an update) arrives.
#[derive(Default)]
pub struct TerminalBadge {
    text: String,
    color: Option<String>,
}

impl BadgeSink for TerminalBadge {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.color = None;
    }

    fn set_color(&mut self, color: &str) {
        self.color = Some(color.to_string());
    }

    fn set_tooltip(&mut self, tooltip: &str) {
        match self.color.as_deref() {
            _ if self.text.is_empty() => eprintln!("{} {}", dim("●"), dim(tooltip)),
            Some(ALERT_COLOR) => eprintln!("{} {}", alert(format!("● {}", self.text)), tooltip),
            _ => eprintln!("{} {}", cyan(format!("● {}", self.text)), tooltip),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
struct BadgeState {
    text: String,
    color: Option<String>,
    tooltip: String,
}

/// Writes the badge as JSON to a file, for status bars and widgets to pick up.
///
/// The file is replaced once per update, when the tooltip arrives, so readers
/// never see a half-applied badge.
pub struct FileBadge {
    path: PathBuf,
    state: BadgeState,
}

impl FileBadge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: BadgeState::default(),
        }
    }

    fn flush(&self) {
        if let Err(e) = write_atomic(&self.path, &self.state) {
            warn!("Failed to write badge file {}: {e}", self.path.display());
        }
    }
}

fn write_atomic(path: &Path, state: &BadgeState) -> std::io::Result<()> {
    let json = serde_json::to_vec(state)?;
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

impl BadgeSink for FileBadge {
    fn set_text(&mut self, text: &str) {
        self.state.text = text.to_string();
        self.state.color = None;
    }

    fn set_color(&mut self, color: &str) {
        self.state.color = Some(color.to_string());
    }

    fn set_tooltip(&mut self, tooltip: &str) {
        self.state.tooltip = tooltip.to_string();
        self.flush();
    }
}
