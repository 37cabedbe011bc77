use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::auth::Token;

/// Persisted settings shared by the watcher and the one-shot commands.
///
/// Every section is optional on disk; missing keys fall back to defaults so a
/// partially written file is still readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitLab connection settings
    #[serde(default)]
    pub gitlab: GitLabSettings,

    /// Periodic pipeline check settings
    #[serde(default)]
    pub auto_refresh: AutoRefreshConfig,

    /// Tracked projects, in display order
    #[serde(default)]
    pub projects: Vec<Project>,

    /// Viewer state remembered between runs
    #[serde(default)]
    pub app_state: AppState,

    /// Desktop notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Badge output settings
    #[serde(default)]
    pub badge: BadgeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabSettings {
    /// GitLab instance base URL
    pub url: Option<String>,

    /// GitLab personal access token
    pub token: Option<String>,

    /// Single tracked project from older configurations
    pub project_id: Option<String>,
}

impl GitLabSettings {
    /// Returns the URL and token when both are set and non-empty.
    ///
    /// `token_override` takes the place of the stored token when given.
    pub fn connection_with(&self, token_override: Option<&Token>) -> Option<(&str, Token)> {
        let url = self.url.as_deref().filter(|u| !u.is_empty())?;
        let token = match token_override {
            Some(token) => token.clone(),
            None => Token::from(self.token.as_deref().filter(|t| !t.is_empty())?),
        };
        Some((url, token))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutoRefreshConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Check period in minutes
    #[serde(default = "default_interval")]
    pub interval: u32,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_interval(),
        }
    }
}

/// A tracked GitLab project. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: String,
}

impl Project {
    /// Placeholder used when project metadata is unavailable.
    pub fn unnamed(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Project {id}"),
            path: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppState {
    #[serde(default)]
    pub search_term: String,

    pub status_filter: Option<String>,

    #[serde(default)]
    pub settings_panel_open: bool,

    pub current_project_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationConfig {
    /// Command run for each notification, e.g. `["notify-send", "{title}", "{body}"]`
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BadgeConfig {
    /// File the badge state is written to as JSON
    pub file: Option<PathBuf>,
}

fn default_interval() -> u32 {
    5
}

impl Config {
    /// Load configuration from a specific file path.
    ///
    /// Returns the default configuration if the file does not exist.
    fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Save configuration to a file, creating parent directories as needed.
    fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml" | "yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Moves a legacy single `project-id` into the project list.
    ///
    /// Returns true when the configuration changed.
    fn migrate_legacy_project(&mut self) -> bool {
        let Some(project_id) = self.gitlab.project_id.as_deref() else {
            return false;
        };
        if project_id.is_empty() || !self.projects.is_empty() {
            return false;
        }

        info!("Migrating legacy project {project_id} into the project list");
        self.projects.push(Project::unnamed(project_id));
        true
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }
}

/// File-backed key-value store for [`Config`].
///
/// Readers and writers in different processes see each other's changes on the
/// next load; there is no locking across processes.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform config location:
    /// - Linux: `~/.config/pipewatch/config.toml`
    /// - macOS: `~/Library/Application Support/pipewatch/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("No config directory found")?;
        Ok(dir.join("pipewatch").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        let mut config = Config::load_from_path(&self.path)?;

        if config.migrate_legacy_project() {
            config.save(&self.path)?;
        }

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.save(&self.path)?;
        debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Load, apply `change`, persist, and return the updated configuration.
    pub fn update<F>(&self, change: F) -> Result<Config>
    where
        F: FnOnce(&mut Config) -> Result<()>,
    {
        let mut config = self.load()?;
        change(&mut config)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Last modification time of the backing file, if it exists.
    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
