//! Background pipeline watching: change detection, notifications and the badge.

mod badge;
mod decision;
mod notifier;
mod poller;
mod scheduler;
mod state;

pub use badge::{BadgeSink, FileBadge, TerminalBadge};
pub use notifier::{CommandNotifier, Notifier, TerminalNotifier};
pub use poller::{CycleReport, Poller};
pub use scheduler::{
    spawn_config_watcher, spawn_signal_handler, spawn_stdin_reader, Command, Scheduler,
};
