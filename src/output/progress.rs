use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Spinner on stderr shown while waiting on the GitLab API.
///
/// Call `finish_and_clear` (or drop it) once the request completes.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
