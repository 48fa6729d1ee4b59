// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for download clients.
//!
//! The config file lists every configured backend with its settings:
//!
//! ```json
//! {
//!   "poll_interval_secs": 60,
//!   "clients": [
//!     { "implementation": "nzbget", "name": "NZBGet",
//!       "settings": { "host": "localhost", "port": 6789, "tv_category": "tv" } },
//!     { "implementation": "usenet_blackhole", "name": "Blackhole",
//!       "settings": { "nzb_folder": "/nzb/drop", "watch_folder": "/nzb/done" } }
//!   ]
//! }
//! ```
//!
//! Adapters receive an immutable [`ClientDefinition`] on every call; the
//! driver re-reads the file at the start of each poll cycle.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationFailure;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "FETCHBRIDGE_CONFIG";

/// Default poll interval for the watch loop (in seconds).
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default timeout for fetching a release payload (in seconds).
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Top-level config file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Timeout for fetching NZB payloads from indexers, shared by all clients.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            clients: Vec::new(),
        }
    }
}

impl Config {
    /// Default config file path (`~/.fetchbridge/config.json`).
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        dirs::home_dir()
            .map(|h| h.join(".fetchbridge").join("config.json"))
            .unwrap_or_else(|| PathBuf::from(".fetchbridge/config.json"))
    }

    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_json(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Find a client by its configured name (case-insensitive).
    pub fn client(&self, name: &str) -> Option<&ClientConfig> {
        self.clients
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// One configured backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum ClientConfig {
    Nzbget(ClientDefinition<NzbgetSettings>),
    UsenetBlackhole(ClientDefinition<UsenetBlackholeSettings>),
}

impl ClientConfig {
    pub fn name(&self) -> &str {
        match self {
            ClientConfig::Nzbget(def) => &def.name,
            ClientConfig::UsenetBlackhole(def) => &def.name,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            ClientConfig::Nzbget(def) => def.enable,
            ClientConfig::UsenetBlackhole(def) => def.enable,
        }
    }

    /// Static checks on the settings values, without touching the backend.
    pub fn validate_settings(&self) -> Vec<ValidationFailure> {
        match self {
            ClientConfig::Nzbget(def) => def.settings.validate(),
            ClientConfig::UsenetBlackhole(def) => def.settings.validate(),
        }
    }
}

/// Name, enable flag and backend-specific settings of one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDefinition<S> {
    pub name: String,
    #[serde(default = "default_enable")]
    pub enable: bool,
    pub settings: S,
}

fn default_enable() -> bool {
    true
}

impl<S> ClientDefinition<S> {
    pub fn new(name: impl Into<String>, settings: S) -> Self {
        Self {
            name: name.into(),
            enable: true,
            settings,
        }
    }
}

/// Queue priority understood by NZBGet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NzbgetPriority {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
    VeryHigh,
}

impl NzbgetPriority {
    pub fn value(&self) -> i32 {
        match self {
            NzbgetPriority::VeryLow => -100,
            NzbgetPriority::Low => -50,
            NzbgetPriority::Normal => 0,
            NzbgetPriority::High => 50,
            NzbgetPriority::VeryHigh => 100,
        }
    }
}

/// Settings for an NZBGet backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NzbgetSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_ssl: bool,
    /// The managed category; items in other categories are ignored.
    pub tv_category: String,
    /// Local path of the category's destination directory, when NZBGet sees a
    /// different filesystem than we do.
    pub tv_category_local_path: Option<String>,
    pub recent_tv_priority: NzbgetPriority,
    pub older_tv_priority: NzbgetPriority,
    /// Maximum number of history entries considered per poll.
    pub history_limit: usize,
    /// Per-request timeout (in seconds).
    pub timeout_secs: u64,
}

impl Default for NzbgetSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6789,
            username: "nzbget".to_string(),
            password: "tegbzn6789".to_string(),
            use_ssl: false,
            tv_category: "tv".to_string(),
            tv_category_local_path: None,
            recent_tv_priority: NzbgetPriority::Normal,
            older_tv_priority: NzbgetPriority::Normal,
            history_limit: 30,
            timeout_secs: 30,
        }
    }
}

impl NzbgetSettings {
    /// Local path override, if one is configured and not blank.
    pub fn local_path(&self) -> Option<&str> {
        self.tv_category_local_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Base URL of the JSON-RPC endpoint.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn is_localhost(&self) -> bool {
        self.host == "127.0.0.1" || self.host == "localhost"
    }

    pub fn validate(&self) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        if self.host.trim().is_empty() {
            failures.push(ValidationFailure::new("Host", "Host must not be empty"));
        }
        if self.port == 0 {
            failures.push(ValidationFailure::new("Port", "Port must be greater than 0"));
        }
        if self.username.trim().is_empty() && !self.password.trim().is_empty() {
            failures.push(ValidationFailure::new("Username", "Username is required when a password is set"));
        }
        if self.password.trim().is_empty() && !self.username.trim().is_empty() {
            failures.push(ValidationFailure::new("Password", "Password is required when a username is set"));
        }
        if let Some(local) = self.local_path() {
            if self.tv_category.trim().is_empty() {
                failures.push(ValidationFailure::new(
                    "TvCategory",
                    "A category is required when a local path is set",
                ));
            }
            if !Path::new(local).is_absolute() {
                failures.push(ValidationFailure::new("TvCategoryLocalPath", "Must be an absolute path"));
            }
        }

        failures
    }
}

/// Settings for a blackhole (drop folder / watch folder) backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsenetBlackholeSettings {
    /// Where NZB files are dropped for an external downloader to pick up.
    pub nzb_folder: PathBuf,
    /// Where the external downloader places finished downloads.
    pub watch_folder: PathBuf,
}

impl UsenetBlackholeSettings {
    pub fn validate(&self) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        if self.nzb_folder.as_os_str().is_empty() {
            failures.push(ValidationFailure::new("NzbFolder", "Folder must not be empty"));
        }
        if self.watch_folder.as_os_str().is_empty() {
            failures.push(ValidationFailure::new("WatchFolder", "Folder must not be empty"));
        }

        failures
    }
}
