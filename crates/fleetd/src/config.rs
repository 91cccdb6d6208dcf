//! `fleetd.toml` configuration.
//!
//! Every section is optional; missing keys take the defaults below.
//! Command-line flags override the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use fleetgrid_orchestrator::OrchestratorConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub control: ControlConfig,
    pub orchestrator: OrchestratorConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8443,
            data_dir: PathBuf::from("/var/lib/fleetgrid"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub sweep_interval_secs: u64,
    pub stale_after_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 15 * 60,
            stale_after_secs: 60 * 60,
        }
    }
}

impl RegistryConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Cluster Control API root. Without one the daemon runs against an
    /// in-memory control plane with no clusters.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl ControlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token name → HS256 signing key.
    pub api_keys: HashMap<String, String>,
    /// Email → user id.
    pub users: HashMap<String, String>,
}

impl Config {
    /// Read `path`, or return the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("fleetgrid.redb")
    }
}
