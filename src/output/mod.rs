mod progress;
mod styling;
mod tables;

pub use progress::spinner;
pub use styling::{alert, bright, cyan, dim, done_mark, status_styled, warning};
pub use tables::{create_cyan_header, create_table};

/// Prints the `pipewatch` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        console::style("🚦 pipewatch").magenta().bold(),
        dim(env!("CARGO_PKG_VERSION")),
        dim("GitLab Pipeline Monitor")
    );
}
