//! Report Aggregator
//!
//! Fans out over the configured servers: each task connects, runs the
//! collector remotely, downloads the report into the output directory and
//! disconnects. Tasks share nothing but the per-run result map.
//!
//! ```text
//!            ┌── server A: connect → collect → download → disconnect
//! fetch_all ─┼── server B: connect → collect → download → disconnect
//!            └── server C: ...
//!                              │
//!                              ▼
//!                  DashMap<server, FetchStatus> ──► FetchSummary
//! ```

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{report_file_name, Config, ServerEntry};
use crate::domain::ports::{RemoteConnector, RemoteSession};
use crate::error::{Error, Result};

// =============================================================================
// Options
// =============================================================================

/// Everything a fetch run needs besides the connector
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// cephscope binary on the storage nodes
    pub remote_binary: String,
    /// Report path on the storage nodes
    pub remote_output: String,
    /// Local directory for downloaded reports
    pub output_dir: PathBuf,
    /// Concurrent server tasks
    pub parallelism: usize,
    /// Password fed to `sudo -S`; `sudo -n` is used without one
    pub sudo_password: Option<String>,
}

impl FetchOptions {
    /// Build options from a validated config
    pub fn from_config(config: &Config, sudo_password: Option<String>) -> Result<Self> {
        config.validate_for_fetch()?;
        let remote_binary = config
            .paths
            .remote_binary_path
            .clone()
            .ok_or_else(|| Error::Config("paths.remote_binary_path is required".to_string()))?;

        Ok(Self {
            remote_binary,
            remote_output: config.paths.remote_output_path.clone(),
            output_dir: config.paths.output_dir.clone(),
            parallelism: config.fetch_parallelism(),
            sudo_password: sudo_password.filter(|p| !p.is_empty()),
        })
    }

    /// Remote command line running the collector for `server`
    pub fn remote_command(&self, server: &str) -> String {
        let sudo = if self.sudo_password.is_some() {
            "sudo -S -p ''"
        } else {
            "sudo -n"
        };
        format!(
            "{} {} collect --output {} --node-name {}",
            sudo,
            shell_quote(&self.remote_binary),
            shell_quote(&self.remote_output),
            shell_quote(server)
        )
    }
}

/// Environment variable holding the sudo password
pub const SUDO_PASSWORD_ENV: &str = "CEPHSCOPE_SUDO_PASSWORD";

/// Sudo password from `file` if given, else from `env_value`.
///
/// The file's trailing line break is dropped.
pub async fn resolve_sudo_password(file: Option<&Path>, env_value: Option<String>) -> Result<Option<String>> {
    match file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::Config(format!("Sudo password file {} not readable: {}", path.display(), e))
            })?;
            Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
        }
        None => Ok(env_value),
    }
}

/// Single-quote a word for a POSIX shell
fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '~'))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

// =============================================================================
// Results
// =============================================================================

/// Outcome for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    Succeeded { path: PathBuf },
    Failed { reason: String },
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Succeeded { .. })
    }
}

/// Per-server outcome in server order
#[derive(Debug, Clone, Serialize)]
pub struct ServerOutcome {
    pub server: String,
    #[serde(flatten)]
    pub status: FetchStatus,
}

/// Summary file written next to the reports
pub const SUMMARY_FILE: &str = "fetch-summary.json";

/// Result of one fetch run
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub run_id: Uuid,
    pub outcomes: Vec<ServerOutcome>,
}

impl FetchSummary {
    /// Write the summary as JSON into `dir`, replacing the previous run's
    pub async fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(SUMMARY_FILE);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// At least one report was downloaded
    pub fn any_succeeded(&self) -> bool {
        self.succeeded() > 0
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Concurrent remote collection
pub struct Aggregator<C: RemoteConnector> {
    connector: C,
    options: FetchOptions,
}

impl<C: RemoteConnector> Aggregator<C> {
    pub fn new(connector: C, options: FetchOptions) -> Self {
        Self { connector, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch a report from every server.
    ///
    /// Never fails as a whole; per-server failures are in the summary.
    pub async fn fetch_all(&self, servers: &[ServerEntry]) -> FetchSummary {
        let run_id = Uuid::new_v4();
        let results: DashMap<String, FetchStatus> = DashMap::with_capacity(servers.len());
        let parallelism = self.options.parallelism.max(1);

        info!(
            run_id = %run_id,
            servers = servers.len(),
            parallelism,
            "Fetching reports"
        );

        stream::iter(servers)
            .for_each_concurrent(parallelism, |server| {
                let results = &results;
                let span = info_span!("fetch", run_id = %run_id, server = %server.name);
                async move {
                    let status = match self.fetch_one(server).await {
                        Ok(path) => {
                            info!(path = %path.display(), "Report downloaded");
                            FetchStatus::Succeeded { path }
                        }
                        Err(e) => {
                            error!(error = %e, "Fetch failed");
                            FetchStatus::Failed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    results.insert(server.name.clone(), status);
                }
                .instrument(span)
            })
            .await;

        let outcomes = servers
            .iter()
            .map(|server| ServerOutcome {
                server: server.name.clone(),
                status: results
                    .remove(&server.name)
                    .map(|(_, status)| status)
                    .unwrap_or_else(|| FetchStatus::Failed {
                        reason: "no result recorded".to_string(),
                    }),
            })
            .collect();

        let summary = FetchSummary { run_id, outcomes };
        if summary.failed() > 0 {
            warn!(
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                "Fetch finished with failures"
            );
        } else {
            info!(succeeded = summary.succeeded(), "Fetch finished");
        }
        summary
    }

    /// Connect, collect, download, disconnect
    async fn fetch_one(&self, server: &ServerEntry) -> Result<PathBuf> {
        info!("Connecting to {} ({})", server.name, server.address);
        let session = self.connector.connect(server).await?;
        let result = self.collect_and_download(session.as_ref(), server).await;
        session.disconnect().await;
        result
    }

    async fn collect_and_download(&self, session: &dyn RemoteSession, server: &ServerEntry) -> Result<PathBuf> {
        let command = self.options.remote_command(&server.name);
        info!("Running collector on {}", server.name);

        let output = session
            .exec(&command, self.options.sudo_password.as_deref())
            .await?;
        if !output.success() {
            let detail = output
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            return Err(Error::Remote {
                server: server.name.clone(),
                reason: format!("collector exited with status {:?}: {}", output.status, detail),
            });
        }

        tokio::fs::create_dir_all(&self.options.output_dir).await?;
        let local = self.options.output_dir.join(report_file_name(&server.name));
        session.download(&self.options.remote_output, &local).await?;

        Ok(local)
    }
}
