use log::{debug, info, warn};

use crate::config::Project;
use crate::output::{cyan, dim, status_styled};
use crate::providers::gitlab::{project_pipelines_url, Pipeline, PipelineStatus};

/// A desktop notification about a pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: &'static str,
    /// 2 for failures, 1 otherwise
    pub priority: u8,
    /// Opened when the notification is activated
    pub url: String,
    pub status: PipelineStatus,
}

impl Notification {
    pub fn for_pipeline(web_url: &str, project: &Project, pipeline: &Pipeline) -> Self {
        let priority = if pipeline.status == PipelineStatus::Failed {
            2
        } else {
            1
        };

        Self {
            title: format!("GitLab Pipeline {}", pipeline.status.label()),
            body: format!(
                "Project: {}\nRef: {}\nPipeline #{}",
                project.name, pipeline.ref_, pipeline.id
            ),
            icon: pipeline.status.icon(),
            priority,
            url: project_pipelines_url(web_url, &project.path),
            status: pipeline.status.clone(),
        }
    }

    fn urgency(&self) -> &'static str {
        if self.priority >= 2 {
            "critical"
        } else {
            "normal"
        }
    }
}

/// Delivers notifications. Fire-and-forget: failures are logged, never returned.
pub trait Notifier: Send {
    fn notify(&self, notification: &Notification);
}

/// Prints notifications to stderr, including the pipelines link.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) {
        let title = status_styled(&notification.status, &notification.title);

        eprintln!("🔔 {title}");
        for line in notification.body.lines() {
            eprintln!("   {line}");
        }
        eprintln!("   {}", cyan(&notification.url));
        eprintln!("   {}", dim(chrono::Local::now().format("%H:%M:%S")));
    }
}

/// Runs an external command (e.g. `notify-send`) per notification.
///
/// Arguments may contain `{title}`, `{body}`, `{icon}`, `{urgency}` and `{url}`
/// placeholders. The child is not awaited.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Returns `None` for an empty command line.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, notification: &Notification) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{title}", &notification.title)
                    .replace("{body}", &notification.body)
                    .replace("{icon}", notification.icon)
                    .replace("{urgency}", notification.urgency())
                    .replace("{url}", &notification.url)
            })
            .collect()
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notification: &Notification) {
        let args = self.render_args(notification);
        debug!("Running notification command {} {:?}", self.program, args);

        match tokio::process::Command::new(&self.program).args(&args).spawn() {
            Ok(_) => info!("Sent notification: {}", notification.title),
            Err(e) => warn!("Failed to run notification command {}: {e}", self.program),
        }
    }
}
