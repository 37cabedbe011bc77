use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::{AutoRefreshConfig, ConfigStore};

use super::poller::{CycleReport, Poller};

/// How often the config file is checked for changes made by other commands.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Triggers accepted by the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    EnableAutoRefresh { interval: u32 },
    DisableAutoRefresh,
    CheckNow,
    /// The config store changed on disk
    Reload,
    Shutdown,
}

/// Parses a line typed on the watcher's stdin.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "check" => Command::CheckNow,
        "enable" => {
            let interval = words.next()?.parse().ok().filter(|&n: &u32| n >= 1)?;
            Command::EnableAutoRefresh { interval }
        }
        "disable" => Command::DisableAutoRefresh,
        "reload" => Command::Reload,
        "quit" | "exit" => Command::Shutdown,
        _ => return None,
    };
    Some(command)
}

/// Single-consumer loop driving the poller from timer ticks and commands.
///
/// A cycle always runs to completion before the next trigger is read. Check
/// requests and ticks that arrive while a cycle is running are dropped.
pub struct Scheduler {
    poller: Poller,
    store: Option<ConfigStore>,
    commands: mpsc::Receiver<Command>,
    auto_refresh: AutoRefreshConfig,
    timer: Option<Interval>,
    cycles: usize,
}

impl Scheduler {
    pub fn new(
        poller: Poller,
        store: Option<ConfigStore>,
        auto_refresh: AutoRefreshConfig,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let mut scheduler = Self {
            poller,
            store,
            commands,
            auto_refresh: AutoRefreshConfig::default(),
            timer: None,
            cycles: 0,
        };
        scheduler.set_auto_refresh(auto_refresh);
        scheduler
    }

    /// Number of poll cycles started so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub async fn run(&mut self) {
        loop {
            let trigger = tokio::select! {
                command = self.commands.recv() => command.unwrap_or(Command::Shutdown),
                () = next_tick(&mut self.timer) => Command::CheckNow,
            };

            if !self.handle(trigger).await {
                break;
            }
        }

        info!("Watcher stopped after {} checks", self.cycles);
    }

    /// Returns false when the loop should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::CheckNow => {
                let Some(queued) = self.check().await else {
                    return false;
                };
                return self.drain_while_busy(queued);
            }
            Command::EnableAutoRefresh { interval } => {
                self.persist(AutoRefreshConfig {
                    enabled: true,
                    interval,
                });
            }
            Command::DisableAutoRefresh => {
                self.persist(AutoRefreshConfig {
                    enabled: false,
                    interval: self.auto_refresh.interval,
                });
            }
            Command::Reload => self.reload(),
            Command::Shutdown => return false,
        }
        true
    }

    /// Runs one cycle while still listening for commands.
    ///
    /// Shutdown (or a closed channel) abandons the cycle and returns `None`.
    /// Other commands are queued and returned once the cycle completes.
    async fn check(&mut self) -> Option<Vec<Command>> {
        self.cycles += 1;
        let mut queued = Vec::new();

        let cycle = self.poller.run_cycle();
        tokio::pin!(cycle);

        let report = loop {
            tokio::select! {
                biased;
                report = &mut cycle => break report,
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        info!("Shutdown requested, abandoning pipeline check");
                        return None;
                    }
                    Some(command) => queued.push(command),
                },
            }
        };

        if let CycleReport::Completed { notified, .. } = report {
            debug!("Cycle {} sent {} notifications", self.cycles, notified.len());
        }
        Some(queued)
    }

    /// Applies commands that arrived during a cycle, discarding check requests.
    ///
    /// The timer period restarts from the end of the cycle.
    fn drain_while_busy(&mut self, queued: Vec<Command>) -> bool {
        if let Some(timer) = self.timer.as_mut() {
            timer.reset();
        }

        let pending = std::iter::from_fn(|| self.commands.try_recv().ok()).collect::<Vec<_>>();
        for command in queued.into_iter().chain(pending) {
            match command {
                Command::CheckNow => debug!("Dropping check request received while busy"),
                Command::Shutdown => return false,
                Command::Reload => self.reload(),
                Command::EnableAutoRefresh { interval } => self.persist(AutoRefreshConfig {
                    enabled: true,
                    interval,
                }),
                Command::DisableAutoRefresh => self.persist(AutoRefreshConfig {
                    enabled: false,
                    interval: self.auto_refresh.interval,
                }),
            }
        }
        true
    }

    fn persist(&mut self, auto_refresh: AutoRefreshConfig) {
        if let Some(store) = &self.store {
            if let Err(e) = store.update(|config| {
                config.auto_refresh = auto_refresh;
                Ok(())
            }) {
                warn!("Failed to save auto-refresh settings: {e:#}");
            }
        }
        self.set_auto_refresh(auto_refresh);
    }

    fn reload(&mut self) {
        let Some(store) = &self.store else {
            return;
        };

        let config = match store.load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to reload settings: {e:#}");
                return;
            }
        };

        if let Err(e) = self.poller.apply_config(&config) {
            warn!("Failed to apply settings: {e}");
        }
        self.set_auto_refresh(config.auto_refresh);
    }

    /// (Re)arms or clears the timer. Unchanged settings keep the running timer.
    fn set_auto_refresh(&mut self, auto_refresh: AutoRefreshConfig) {
        // A zero interval cannot be scheduled and counts as disabled.
        let auto_refresh = AutoRefreshConfig {
            enabled: auto_refresh.enabled && auto_refresh.interval >= 1,
            ..auto_refresh
        };
        let unchanged = auto_refresh == self.auto_refresh && self.timer.is_some() == auto_refresh.enabled;
        if unchanged {
            return;
        }
        self.auto_refresh = auto_refresh;

        if auto_refresh.enabled {
            let period = Duration::from_secs(u64::from(auto_refresh.interval) * 60);
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            self.timer = Some(timer);
            info!("Auto refresh enabled, interval: {} minutes", auto_refresh.interval);
        } else {
            self.timer = None;
            info!("Auto refresh disabled");
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Sends `Reload` whenever the config file's modification time changes.
pub fn spawn_config_watcher(store: ConfigStore, commands: mpsc::Sender<Command>) {
    let mut last: Option<SystemTime> = store.modified();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CONFIG_POLL_INTERVAL);

        loop {
            ticker.tick().await;
            let current = store.modified();
            if current != last {
                last = current;
                debug!("Config file changed: {}", store.path().display());
                if commands.send(Command::Reload).await.is_err() {
                    break;
                }
            }
        }
    });
}

/// Forwards commands typed on stdin to the watch loop.
pub fn spawn_stdin_reader(commands: mpsc::Sender<Command>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Some(command) => {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command: {line} (try check, enable <minutes>, disable, reload, quit)"),
            }
        }
    });
}

/// Sends `Shutdown` on Ctrl-C.
pub fn spawn_signal_handler(commands: mpsc::Sender<Command>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = commands.send(Command::Shutdown).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Project};
    use crate::monitor::badge::TerminalBadge;
    use crate::monitor::notifier::TerminalNotifier;

    fn unconfigured_poller() -> Poller {
        Poller::new(Box::new(TerminalNotifier), Box::new(TerminalBadge::default()))
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("check"), Some(Command::CheckNow));
        assert_eq!(
            parse_command("enable 10"),
            Some(Command::EnableAutoRefresh { interval: 10 })
        );
        assert_eq!(parse_command("  disable "), Some(Command::DisableAutoRefresh));
        assert_eq!(parse_command("quit"), Some(Command::Shutdown));
        assert_eq!(parse_command("enable 0"), None);
        assert_eq!(parse_command("enable"), None);
        assert_eq!(parse_command("refresh"), None);
    }

    #[tokio::test]
    async fn test_check_requests_while_busy_are_dropped() {
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            None,
            AutoRefreshConfig::default(),
            rx,
        );

        tx.send(Command::CheckNow).await.unwrap();
        tx.send(Command::CheckNow).await.unwrap();
        tx.send(Command::CheckNow).await.unwrap();
        tx.send(Command::Shutdown).await.unwrap();

        scheduler.run().await;
        assert_eq!(scheduler.cycles(), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_stops_loop() {
        let (tx, rx) = mpsc::channel(1);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            None,
            AutoRefreshConfig::default(),
            rx,
        );
        drop(tx);

        scheduler.run().await;
        assert_eq!(scheduler.cycles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_triggers_cycles_every_interval() {
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            None,
            AutoRefreshConfig {
                enabled: true,
                interval: 1,
            },
            rx,
        );

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            tx.send(Command::Shutdown).await.unwrap();
        });

        scheduler.run().await;
        assert_eq!(scheduler.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_stops_timer() {
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            None,
            AutoRefreshConfig {
                enabled: true,
                interval: 1,
            },
            rx,
        );

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            tx.send(Command::DisableAutoRefresh).await.unwrap();
            tokio::time::sleep(Duration::from_secs(300)).await;
            tx.send(Command::Shutdown).await.unwrap();
        });

        scheduler.run().await;
        assert_eq!(scheduler.cycles(), 1);
    }

    #[tokio::test]
    async fn test_enable_persists_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            Some(store.clone()),
            AutoRefreshConfig::default(),
            rx,
        );

        tx.send(Command::EnableAutoRefresh { interval: 15 }).await.unwrap();
        tx.send(Command::Shutdown).await.unwrap();
        scheduler.run().await;

        let config: Config = store.load().unwrap();
        assert!(config.auto_refresh.enabled);
        assert_eq!(config.auto_refresh.interval, 15);
    }

    fn tracked_config(url: &str, ids: &[&str]) -> Config {
        let mut config = Config::default();
        config.gitlab.url = Some(url.to_string());
        config.gitlab.token = Some("glpat-test".to_string());
        config.projects = ids.iter().map(|id| Project::unnamed(id)).collect();
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_picks_up_auto_refresh_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            Some(store.clone()),
            AutoRefreshConfig::default(),
            rx,
        );

        store
            .update(|config| {
                config.auto_refresh = AutoRefreshConfig {
                    enabled: true,
                    interval: 1,
                };
                Ok(())
            })
            .unwrap();

        tokio::spawn(async move {
            tx.send(Command::Reload).await.unwrap();
            tokio::time::sleep(Duration::from_secs(61)).await;
            tx.send(Command::Shutdown).await.unwrap();
        });

        scheduler.run().await;
        assert_eq!(scheduler.cycles(), 1);
    }

    #[tokio::test]
    async fn test_reload_applies_project_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            Some(store.clone()),
            AutoRefreshConfig::default(),
            rx,
        );
        assert!(!scheduler.poller.is_ready());

        store
            .save(&tracked_config("http://127.0.0.1:9", &["42"]))
            .unwrap();
        tx.send(Command::Reload).await.unwrap();
        tx.send(Command::Shutdown).await.unwrap();
        scheduler.run().await;

        assert!(scheduler.poller.is_ready());
        assert_eq!(scheduler.cycles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_config_keeps_previous_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::new(&path);
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            Some(store),
            AutoRefreshConfig {
                enabled: true,
                interval: 1,
            },
            rx,
        );

        std::fs::write(&path, "[auto-refresh\nenabled = ").unwrap();

        tokio::spawn(async move {
            tx.send(Command::Reload).await.unwrap();
            tokio::time::sleep(Duration::from_secs(61)).await;
            tx.send(Command::Shutdown).await.unwrap();
        });

        scheduler.run().await;
        assert_eq!(scheduler.cycles(), 1);
    }

    #[test]
    fn test_zero_interval_counts_as_disabled() {
        let (_tx, rx) = mpsc::channel(1);
        let mut scheduler = Scheduler::new(
            unconfigured_poller(),
            None,
            AutoRefreshConfig::default(),
            rx,
        );

        scheduler.set_auto_refresh(AutoRefreshConfig {
            enabled: true,
            interval: 0,
        });
        assert!(scheduler.timer.is_none());
        assert_eq!(
            scheduler.auto_refresh,
            AutoRefreshConfig {
                enabled: false,
                interval: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_config_watcher_sends_reload_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let (tx, mut rx) = mpsc::channel(8);

        spawn_config_watcher(store.clone(), tx);
        store.save(&Config::default()).unwrap();

        let command = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap();
        assert_eq!(command, Some(Command::Reload));
    }

    #[tokio::test]
    async fn test_shutdown_abandons_hung_check() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let mut poller = unconfigured_poller();
        poller.apply_config(&tracked_config(&url, &["1"])).unwrap();

        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = Scheduler::new(poller, None, AutoRefreshConfig::default(), rx);

        tx.send(Command::CheckNow).await.unwrap();
        tx.send(Command::Shutdown).await.unwrap();

        tokio::time::timeout(Duration::from_secs(10), scheduler.run())
            .await
            .unwrap();
        assert_eq!(scheduler.cycles(), 1);
        drop(listener);
    }
}
