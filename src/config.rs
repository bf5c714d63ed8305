//! Layered configuration
//!
//! Defaults, then an optional TOML file, then environment variables. CLI
//! flags are applied last by the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use mcdash_tail::TailConfig;
use mcdash_web::AllowList;

/// Environment variables understood on top of the config file
pub const ENV_LOG_FILE: &str = "LOG_FILE_PATH";
pub const ENV_AUTHORIZED_EMAILS: &str = "AUTHORIZED_EMAILS";
pub const ENV_BIND: &str = "MCDASH_BIND";
pub const ENV_CONTAINER: &str = "MCDASH_CONTAINER";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind: String,
    /// Log file to tail
    pub log_file: PathBuf,
    /// Emails allowed to use the dashboard
    pub authorized_emails: Vec<String>,
    /// Request header carrying the signed-in email
    pub identity_header: String,
    /// Container restarted by the restart action
    pub container: String,
    pub container_runtime: String,
    pub poll_interval_ms: u64,
    pub keepalive_secs: u64,
    /// Backlog sent to a new subscriber, in bytes
    pub initial_window_bytes: u64,
    pub max_subscriptions: usize,
    /// Default tracing directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            log_file: PathBuf::from("latest.log"),
            authorized_emails: Vec::new(),
            identity_header: mcdash_web::DEFAULT_IDENTITY_HEADER.to_string(),
            container: mcdash_web::restart::DEFAULT_CONTAINER.to_string(),
            container_runtime: mcdash_web::restart::DEFAULT_RUNTIME.to_string(),
            poll_interval_ms: 1000,
            keepalive_secs: 25,
            initial_window_bytes: 50_000,
            max_subscriptions: mcdash_tail::DEFAULT_MAX_SUBSCRIPTIONS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// `~/.mcdash/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".mcdash").join("config.toml"))
    }

    /// Load defaults overlaid with a config file
    ///
    /// An explicit path must exist; the default path is used only if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_LOG_FILE) {
            self.log_file = PathBuf::from(path);
        }
        if let Some(emails) = get(ENV_AUTHORIZED_EMAILS) {
            self.authorized_emails = emails
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(bind) = get(ENV_BIND) {
            self.bind = bind;
        }
        if let Some(container) = get(ENV_CONTAINER) {
            self.container = container;
        }
    }

    pub fn tail_config(&self) -> TailConfig {
        TailConfig::new(&self.log_file)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_keepalive_interval(Duration::from_secs(self.keepalive_secs))
            .with_initial_window(self.initial_window_bytes)
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(&self.authorized_emails)
    }
}
