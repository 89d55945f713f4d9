//! Operator configuration file
//!
//! `~/.config/stackup/config.toml`, every section optional:
//!
//! ```toml
//! [defaults]
//! root_dir = "/var/www"
//! project_name = "community"
//!
//! [connection]
//! host = "node.example.org"
//! user = "deploy"
//! identity_file = "~/.ssh/id_ed25519"
//!
//! [health]
//! interval_secs = 2
//! max_attempts = 60
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use workflow::PollConfig;

use crate::ssh::HostSpec;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("stackup"))
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: DefaultsConfig,
    pub connection: ConnectionConfig,
    pub health: HealthConfig,
}

/// Overrides for the built-in resolution defaults
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub root_dir: Option<String>,
    pub project_name: Option<String>,
    pub db_user: Option<String>,
    /// Fixed database password; a random one is generated when absent
    pub db_password: Option<String>,
    pub server_name: Option<String>,
}

/// Managed host connection defaults
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
}

/// Service health polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds between polling passes
    pub interval_secs: u64,
    /// Polling passes before giving up; 0 polls without limit
    pub max_attempts: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            max_attempts: 120,
        }
    }
}

impl HealthConfig {
    pub fn poll_config(&self) -> PollConfig {
        let interval = Duration::from_secs(self.interval_secs);
        if self.max_attempts == 0 {
            PollConfig::unbounded(interval)
        } else {
            PollConfig::new(interval, self.max_attempts)
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when it is missing
    ///
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl ConnectionConfig {
    /// The managed host: `cli` when given, else the configured host
    ///
    /// Configured user and port fill in whatever the address leaves out.
    pub fn target(&self, cli: Option<&str>) -> Result<HostSpec> {
        let mut spec = match cli.or(self.host.as_deref()) {
            Some(host) => host
                .parse::<HostSpec>()
                .map_err(|e| anyhow::anyhow!("Invalid host: {e}"))?,
            None => return Ok(HostSpec::default()),
        };
        if spec.user.is_none() {
            spec.user.clone_from(&self.user);
        }
        if spec.port.is_none() {
            spec.port = self.port;
        }
        Ok(spec)
    }

    /// The ssh identity file: `cli` when given, else the configured one
    pub fn identity(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf).or_else(|| {
            self.identity_file
                .as_deref()
                .map(|file| PathBuf::from(shellexpand::tilde(file).as_ref()))
        })
    }
}
