use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use tokio::sync::mpsc;
use url::Url;

use crate::auth::Token;
use crate::config::{AutoRefreshConfig, Config, ConfigStore, Project};
use crate::error::PipewatchError;
use crate::monitor::{
    spawn_config_watcher, spawn_signal_handler, spawn_stdin_reader, BadgeSink, Command,
    CommandNotifier, CycleReport, FileBadge, Notifier, Poller, Scheduler, TerminalBadge,
    TerminalNotifier,
};
use crate::output::{
    bright, create_cyan_header, create_table, cyan, dim, done_mark, spinner, warning,
};
use crate::providers::gitlab::{GitLabClient, PipelineStatus};
use crate::viewer::{filter_pipelines, render_pipelines, Viewer, DEFAULT_PAGE_SIZE};

#[derive(Parser)]
#[command(name = "pipewatch")]
#[command(author, version, about = "GitLab Pipeline Monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "PIPEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Access token, overriding the stored one
    #[arg(short, long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch all tracked projects and notify on pipeline changes
    Watch {
        /// Check once right away instead of waiting for the first tick
        #[arg(long, default_value_t = false)]
        immediate: bool,
    },

    /// Check all tracked projects once
    Check,

    /// List recent pipelines of a project
    List {
        /// Project ID (defaults to the current project)
        #[arg(short = 'P', long)]
        project: Option<String>,

        /// Search ref, commit message, author and user
        #[arg(short, long)]
        search: Option<String>,

        /// Only show pipelines with this status ("all" clears the filter)
        #[arg(short = 'S', long)]
        status: Option<String>,

        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,

        #[arg(short, long, default_value_t = false)]
        pretty: bool,
    },

    /// Manage tracked projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage the GitLab connection
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Enable or disable periodic checks
    AutoRefresh {
        #[command(subcommand)]
        action: AutoRefreshAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Track a project by its numeric ID
    Add { id: String },
    /// Stop tracking a project
    Remove { id: String },
    /// Show tracked projects
    List,
    /// Select the project `list` shows by default
    Use { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Store the GitLab URL and/or access token
    Set {
        #[arg(long)]
        url: Option<String>,

        #[arg(long = "access-token")]
        access_token: Option<String>,
    },
    /// Show the current settings
    Show,
}

#[derive(Subcommand)]
enum AutoRefreshAction {
    Enable {
        /// Check period in minutes
        #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
        interval: u32,
    },
    Disable,
}

impl Cli {
    fn store(&self) -> Result<ConfigStore> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => ConfigStore::default_path()?,
        };
        Ok(ConfigStore::new(path))
    }

    fn token_override(&self) -> Option<Token> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(Token::from)
    }

    fn client(&self, config: &Config) -> Result<GitLabClient> {
        let (url, token) = config
            .gitlab
            .connection_with(self.token_override().as_ref())
            .ok_or(PipewatchError::NotConfigured)?;
        Ok(GitLabClient::new(url, &token)?)
    }

    fn poller(&self, config: &Config) -> Result<Poller> {
        let notifier: Box<dyn Notifier> = match config
            .notifications
            .command
            .as_deref()
            .and_then(CommandNotifier::new)
        {
            Some(command) => Box::new(command),
            None => Box::new(TerminalNotifier),
        };

        let badge: Box<dyn BadgeSink> = match &config.badge.file {
            Some(path) => Box::new(FileBadge::new(path)),
            None => Box::new(TerminalBadge::default()),
        };

        let mut poller = Poller::new(notifier, badge).with_token_override(self.token_override());
        poller.apply_config(config)?;
        Ok(poller)
    }

    async fn execute_watch(&self, immediate: bool) -> Result<()> {
        let store = self.store()?;
        let config = store.load()?;
        let poller = self.poller(&config)?;

        if !poller.is_ready() {
            warn!("Nothing to watch yet: configure GitLab and add a project, changes are picked up automatically");
        }

        let (commands, receiver) = mpsc::channel(16);
        spawn_config_watcher(store.clone(), commands.clone());
        spawn_stdin_reader(commands.clone());
        spawn_signal_handler(commands.clone());

        if immediate {
            commands.send(Command::CheckNow).await?;
        }

        eprintln!(
            "{} {} ({})",
            bright("Watching"),
            cyan(format!("{} projects", config.projects.len())),
            dim(if config.auto_refresh.enabled {
                format!("every {} min", config.auto_refresh.interval)
            } else {
                "auto refresh off".to_string()
            })
        );
        eprintln!("{}", dim("Commands: check, enable <minutes>, disable, reload, quit"));

        let mut scheduler = Scheduler::new(poller, Some(store), config.auto_refresh, receiver);
        scheduler.run().await;
        eprintln!("{}", dim(format!("Stopped after {} checks", scheduler.cycles())));

        Ok(())
    }

    async fn execute_check(&self) -> Result<()> {
        let config = self.store()?.load()?;
        let mut poller = self.poller(&config)?;

        match poller.run_cycle().await {
            CycleReport::Skipped
                if config
                    .gitlab
                    .connection_with(self.token_override().as_ref())
                    .is_none() =>
            {
                Err(PipewatchError::NotConfigured.into())
            }
            CycleReport::Skipped => {
                println!("No projects tracked yet, add one with `pipewatch project add <id>`");
                Ok(())
            }
            CycleReport::Completed {
                succeeded,
                failed,
                notified,
                badge,
            } => {
                let failed = if failed > 0 {
                    warning(format!("{failed} could not be checked"))
                } else {
                    dim(format!("{failed} could not be checked"))
                };
                println!(
                    "{} Checked {succeeded} projects, {failed}, {} notifications",
                    done_mark(),
                    notified.len()
                );
                println!("  {}", badge.tooltip());
                Ok(())
            }
        }
    }

    async fn execute_list(
        &self,
        project: Option<&str>,
        search: Option<&str>,
        status: Option<&str>,
        limit: usize,
        json: bool,
        pretty: bool,
    ) -> Result<()> {
        let store = self.store()?;
        let mut config = store.load()?;
        let client = self.client(&config)?;

        let project_id = project
            .map(ToString::to_string)
            .or_else(|| config.app_state.current_project_id.clone())
            .or_else(|| config.projects.first().map(|p| p.id.clone()))
            .context("No project selected, add one with `pipewatch project add <id>`")?;

        // Remember the selection for the next run
        let previous_state = config.app_state.clone();
        config.app_state.current_project_id = Some(project_id.clone());
        if let Some(search) = search {
            config.app_state.search_term = search.to_string();
        }
        if let Some(status) = status {
            config.app_state.status_filter =
                Some(status.to_string()).filter(|s| !s.is_empty() && s != "all");
        }
        if config.app_state != previous_state {
            store.save(&config)?;
        }

        let project_name = config
            .project(&project_id)
            .map_or_else(|| format!("Project {project_id}"), |p| p.name.clone());
        info!("Loading pipelines for {project_name} ({project_id})");

        let viewer = Viewer::new(client);
        let pb = spinner(format!("Loading pipelines for {project_name}..."));
        let result = viewer.refresh(&project_id, limit).await;
        pb.finish_and_clear();
        let pipelines = result
            .with_context(|| format!("Failed to load pipelines for {project_name}"))?
            .unwrap_or_default();

        let status_filter = config
            .app_state
            .status_filter
            .as_deref()
            .map(PipelineStatus::from);
        let filtered = filter_pipelines(
            &pipelines,
            &config.app_state.search_term,
            status_filter.as_ref(),
        );

        if json {
            let output = if pretty {
                serde_json::to_string_pretty(&filtered)?
            } else {
                serde_json::to_string(&filtered)?
            };
            println!("{output}");
            return Ok(());
        }

        if filtered.is_empty() {
            println!("{}", dim("No pipelines match the current filters"));
        } else {
            println!("{}", render_pipelines(&filtered, Utc::now()));
        }
        eprintln!(
            "{}",
            dim(format!(
                "Loaded {} pipelines, showing {} · updated {}",
                pipelines.len(),
                filtered.len(),
                chrono::Local::now().format("%H:%M:%S")
            ))
        );

        Ok(())
    }

    async fn execute_project_add(&self, id: &str) -> Result<()> {
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(PipewatchError::InvalidProjectId(id.to_string()).into());
        }

        let store = self.store()?;
        let config = store.load()?;
        if config.project(id).is_some() {
            return Err(PipewatchError::DuplicateProject(id.to_string()).into());
        }

        let client = self.client(&config)?;
        let pb = spinner(format!("Checking access to project {id}..."));
        let accessible = client.validate_project(id).await;
        let info = if accessible {
            client.fetch_project_info(id).await
        } else {
            None
        };
        pb.finish_and_clear();

        if !accessible {
            return Err(PipewatchError::ProjectInaccessible(id.to_string()).into());
        }

        let project = info.map_or_else(
            || Project::unnamed(id),
            |info| Project {
                id: id.to_string(),
                name: info.name,
                path: info.path_with_namespace,
            },
        );

        store.update(|config| {
            if config.project(id).is_some() {
                return Err(PipewatchError::DuplicateProject(id.to_string()).into());
            }
            config.projects.push(project.clone());
            if config.projects.len() == 1 {
                config.app_state.current_project_id = Some(project.id.clone());
            }
            Ok(())
        })?;

        println!(
            "{} Added project {} {}",
            done_mark(),
            bright(&project.name),
            dim(format!("({})", project.path))
        );
        Ok(())
    }

    fn execute_project_remove(&self, id: &str) -> Result<()> {
        let config = self.store()?.update(|config| {
            if config.project(id).is_none() {
                return Err(PipewatchError::UnknownProject(id.to_string()).into());
            }
            config.projects.retain(|p| p.id != id);

            if config.app_state.current_project_id.as_deref() == Some(id) {
                config.app_state.current_project_id = config.projects.first().map(|p| p.id.clone());
            }
            Ok(())
        })?;

        println!(
            "{} Removed project {id}, {} remaining",
            done_mark(),
            config.projects.len()
        );
        Ok(())
    }

    fn execute_project_list(&self) -> Result<()> {
        let config = self.store()?.load()?;

        if config.projects.is_empty() {
            println!("No projects tracked yet, add one with `pipewatch project add <id>`");
            return Ok(());
        }

        let current = config.app_state.current_project_id.as_deref();
        let mut table = create_table();
        table.set_header(create_cyan_header(&["", "ID", "Name", "Path"]));
        for project in &config.projects {
            let marker = if current == Some(project.id.as_str()) { "*" } else { "" };
            table.add_row(vec![marker, &project.id, &project.name, &project.path]);
        }
        println!("{table}");
        Ok(())
    }

    fn execute_project_use(&self, id: &str) -> Result<()> {
        self.store()?.update(|config| {
            if config.project(id).is_none() {
                return Err(PipewatchError::UnknownProject(id.to_string()).into());
            }
            config.app_state.current_project_id = Some(id.to_string());
            Ok(())
        })?;

        println!("{} Current project is now {id}", done_mark());
        Ok(())
    }

    fn execute_config_set(&self, url: Option<&str>, access_token: Option<&str>) -> Result<()> {
        if url.is_none() && access_token.is_none() {
            anyhow::bail!("Nothing to set, pass --url and/or --access-token");
        }

        let url = url
            .map(|url| {
                let trimmed = url.trim().trim_end_matches('/');
                Url::parse(trimmed)
                    .map(|_| trimmed.to_string())
                    .map_err(|e| PipewatchError::Config(format!("Invalid GitLab URL {trimmed}: {e}")))
            })
            .transpose()?;

        let store = self.store()?;
        store.update(|config| {
            if let Some(url) = url {
                config.gitlab.url = Some(url);
            }
            if let Some(token) = access_token {
                config.gitlab.token = Some(token.trim().to_string());
            }
            Ok(())
        })?;

        println!(
            "{} Settings saved to {}",
            done_mark(),
            dim(store.path().display())
        );
        Ok(())
    }

    fn execute_config_show(&self) -> Result<()> {
        let store = self.store()?;
        let config = store.load()?;

        let token = config
            .gitlab
            .token
            .as_deref()
            .map_or_else(|| "(not set)".to_string(), |t| Token::from(t).masked());

        println!("{}  {}", bright("Config"), dim(store.path().display()));
        println!(
            "  GitLab URL    {}",
            config.gitlab.url.as_deref().unwrap_or("(not set)")
        );
        println!("  Access token  {token}");
        println!("  Projects      {}", config.projects.len());
        println!(
            "  Auto refresh  {}",
            if config.auto_refresh.enabled {
                format!("every {} min", config.auto_refresh.interval)
            } else {
                "off".to_string()
            }
        );
        Ok(())
    }

    fn execute_auto_refresh(&self, auto_refresh: AutoRefreshConfig) -> Result<()> {
        self.store()?.update(|config| {
            config.auto_refresh = auto_refresh;
            Ok(())
        })?;

        if auto_refresh.enabled {
            println!(
                "{} Auto refresh enabled, every {} minutes",
                done_mark(),
                auto_refresh.interval
            );
        } else {
            println!("{} Auto refresh disabled", done_mark());
        }
        println!("{}", dim("Running watchers pick this up automatically"));
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Watch { immediate } => self.execute_watch(*immediate).await,
            Commands::Check => self.execute_check().await,
            Commands::List {
                project,
                search,
                status,
                limit,
                json,
                pretty,
            } => {
                self.execute_list(
                    project.as_deref(),
                    search.as_deref(),
                    status.as_deref(),
                    *limit,
                    *json,
                    *pretty,
                )
                .await
            }
            Commands::Project { action } => match action {
                ProjectAction::Add { id } => self.execute_project_add(id).await,
                ProjectAction::Remove { id } => self.execute_project_remove(id),
                ProjectAction::List => self.execute_project_list(),
                ProjectAction::Use { id } => self.execute_project_use(id),
            },
            Commands::Config { action } => match action {
                ConfigAction::Set { url, access_token } => {
                    self.execute_config_set(url.as_deref(), access_token.as_deref())
                }
                ConfigAction::Show => self.execute_config_show(),
            },
            Commands::AutoRefresh { action } => match action {
                AutoRefreshAction::Enable { interval } => {
                    self.execute_auto_refresh(AutoRefreshConfig {
                        enabled: true,
                        interval: *interval,
                    })
                }
                AutoRefreshAction::Disable => {
                    // Keep the stored interval so re-enabling restores it
                    let interval = self.store()?.load()?.auto_refresh.interval;
                    self.execute_auto_refresh(AutoRefreshConfig {
                        enabled: false,
                        interval,
                    })
                }
            },
        }
    }
}
