//! Configuration
//!
//! The control host reads a YAML file describing how to reach the storage
//! nodes and how to serve the dashboard:
//!
//! ```yaml
//! ssh:
//!   username: ceph-admin
//!   key_file: ~/.ssh/id_ed25519
//! servers:
//!   ceph-node-01: 10.0.0.11
//!   ceph-node-02: 10.0.0.12
//! paths:
//!   remote_binary_path: /usr/local/bin/cephscope
//! app:
//!   port: 54321
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Default dashboard port
pub const DEFAULT_PORT: u16 = 54321;

/// Prefix of report files on the control host
pub const REPORT_FILE_PREFIX: &str = "ceph-details-output-";

/// File name of a node's report on the control host
pub fn report_file_name(server: &str) -> String {
    format!("{}{}.md", REPORT_FILE_PREFIX, server)
}

// =============================================================================
// Sections
// =============================================================================

/// `[ssh]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote login user
    pub username: Option<String>,
    /// Private key used for authentication
    pub key_file: Option<String>,
    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Key is passphrase-protected (must then be loaded into ssh-agent)
    #[serde(default)]
    pub key_requires_password: bool,
    /// Connection timeout handed to the ssh client
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: None,
            key_file: None,
            port: default_ssh_port(),
            key_requires_password: false,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Key file with a leading `~` expanded
    pub fn key_path(&self) -> Option<PathBuf> {
        self.key_file.as_deref().map(expand_home)
    }
}

/// `[paths]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where the cephscope binary lives on the storage nodes
    pub remote_binary_path: Option<String>,
    /// Where the remote collection writes its report
    #[serde(default = "default_remote_output")]
    pub remote_output_path: String,
    /// Local directory receiving one report per server
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            remote_binary_path: None,
            remote_output_path: default_remote_output(),
            output_dir: default_output_dir(),
        }
    }
}

/// `[app]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Concurrent fetch tasks, 0 means one per server
    #[serde(default)]
    pub max_parallel: usize,
    /// Seconds between rereads of the output directory, 0 disables
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
}

impl AppConfig {
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_parallel: 0,
            reload_interval_secs: default_reload_interval(),
        }
    }
}

/// One storage node to fetch from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Name used for the report file and the dashboard
    pub name: String,
    /// Host name or IP address
    pub address: String,
}

// =============================================================================
// Top-level Config
// =============================================================================

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,
    /// Server name → address
    #[serde(default)]
    pub servers: BTreeMap<String, String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub app: AppConfig,
}

impl Config {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a config file; it must exist
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Config file {} not readable: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Load a config file, falling back to defaults if it does not exist
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::metadata(path).await.is_err() {
            warn!("Config file {} not found. Using defaults.", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Check everything the fetch stage needs
    pub fn validate_for_fetch(&self) -> Result<()> {
        if self.ssh.username.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "Required option 'username' missing from ssh section".to_string(),
            ));
        }
        if self.ssh.key_file.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "Required option 'key_file' missing from ssh section".to_string(),
            ));
        }
        if self
            .paths
            .remote_binary_path
            .as_deref()
            .map_or(true, str::is_empty)
        {
            return Err(Error::Config(
                "Required option 'remote_binary_path' missing from paths section".to_string(),
            ));
        }
        if self.servers.is_empty() {
            return Err(Error::Config(
                "No servers specified in the servers section".to_string(),
            ));
        }
        Ok(())
    }

    /// Servers in name order
    pub fn server_entries(&self) -> Vec<ServerEntry> {
        self.servers
            .iter()
            .map(|(name, address)| ServerEntry {
                name: name.clone(),
                address: address.clone(),
            })
            .collect()
    }

    /// Effective fetch concurrency
    pub fn fetch_parallelism(&self) -> usize {
        match self.app.max_parallel {
            0 => self.servers.len().max(1),
            n => n,
        }
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_remote_output() -> String {
    "/tmp/ceph-mapping.md".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_reload_interval() -> u64 {
    60
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
