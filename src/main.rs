//! cephscope
//!
//! Ceph OSD device mapping collector, aggregator and dashboard.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           cephscope                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   collect    │───▶│    fetch     │───▶│    serve     │       │
//! │  │ (each node)  │    │ (SSH fan-out)│    │ (dashboard)  │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │                  launch = fetch, then serve                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cephscope::adapters::{LocalHost, OpenSshConnector};
use cephscope::aggregator::{resolve_sudo_password, Aggregator, FetchOptions, SUDO_PASSWORD_ENV};
use cephscope::collector::{Collector, CollectorConfig};
use cephscope::config::Config;
use cephscope::dashboard::{bind_addr, serve, spawn_reloader, DashboardState};
use cephscope::error::{Error, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// cephscope - Map Ceph OSDs to their physical devices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Configuration file
    #[arg(long, global = true, env = "CEPHSCOPE_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect the device mapping of this node and write the report
    Collect {
        /// Report file to write
        #[arg(long, short, default_value = "/tmp/ceph-mapping.md")]
        output: PathBuf,

        /// Node name to report instead of the host name
        #[arg(long)]
        node_name: Option<String>,

        /// Directory holding the OSD data directories
        #[arg(long, default_value = "/var/lib/ceph/osd")]
        osd_root: PathBuf,

        /// Ceph cluster name
        #[arg(long, env = "CEPH_CLUSTER", default_value = "ceph")]
        cluster: String,
    },

    /// Collect on every configured server and download the reports
    Fetch(SudoArgs),

    /// Serve the dashboard over the downloaded reports
    Serve {
        /// Bind host (overrides app.host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides app.port)
        #[arg(long)]
        port: Option<u16>,

        /// Report directory (overrides paths.output_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Fetch, then serve
    Launch(SudoArgs),
}

/// The sudo password is never taken on the command line. It comes from
/// `--sudo-password-file` or the `CEPHSCOPE_SUDO_PASSWORD` variable.
#[derive(Args, Debug)]
struct SudoArgs {
    /// File holding the sudo password for the storage nodes
    #[arg(long)]
    sudo_password_file: Option<PathBuf>,
}

impl SudoArgs {
    async fn password(&self) -> Result<Option<String>> {
        let env_value = std::env::var(SUDO_PASSWORD_ENV).ok();
        resolve_sudo_password(self.sudo_password_file.as_deref(), env_value).await
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli.global);

    let result = match cli.command {
        Command::Collect {
            output,
            node_name,
            osd_root,
            cluster,
        } => {
            let config = CollectorConfig {
                osd_root,
                cluster,
                node_name,
            };
            collect(config, &output).await
        }
        Command::Fetch(sudo) => fetch(&cli.global.config, &sudo).await,
        Command::Serve {
            host,
            port,
            output_dir,
        } => {
            let config = match Config::load_or_default(&cli.global.config).await {
                Ok(config) => config,
                Err(e) => return fail(e),
            };
            let host = host.unwrap_or_else(|| config.app.host.clone());
            let port = port.unwrap_or(config.app.port);
            let output_dir = output_dir.unwrap_or_else(|| config.paths.output_dir.clone());
            run_dashboard(&host, port, output_dir, config.app.reload_interval()).await
        }
        Command::Launch(sudo) => launch(&cli.global.config, &sudo).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(e: Error) -> ExitCode {
    error!("{}", e);
    ExitCode::FAILURE
}

// =============================================================================
// Subcommands
// =============================================================================

async fn collect(config: CollectorConfig, output: &Path) -> Result<()> {
    info!("Starting collection");
    info!("  OSD root: {}", config.osd_root.display());
    info!("  Cluster: {}", config.cluster);

    let collector = Collector::new(LocalHost::new(), config);
    let report = collector.collect_to_file(output).await?;

    info!(
        node = %report.node,
        osds = report.units.len(),
        unresolved = report.unresolved_count(),
        "Collection complete"
    );
    println!("Results saved to {}", output.display());
    Ok(())
}

/// Fails only when no server succeeded
async fn fetch(config_path: &Path, sudo: &SudoArgs) -> Result<()> {
    let config = Config::load(config_path).await?;
    let options = FetchOptions::from_config(&config, sudo.password().await?)?;
    let connector = OpenSshConnector::from_config(&config.ssh)?;

    let aggregator = Aggregator::new(connector, options);
    let summary = aggregator.fetch_all(&config.server_entries()).await;

    info!(
        run_id = %summary.run_id,
        "Fetched {}/{} reports",
        summary.succeeded(),
        summary.outcomes.len()
    );
    match summary.write_json(&aggregator.options().output_dir).await {
        Ok(path) => info!("Fetch summary written to {}", path.display()),
        Err(e) => warn!("Failed to write fetch summary: {}", e),
    }

    if summary.any_succeeded() {
        Ok(())
    } else {
        Err(Error::Internal("No report could be fetched".to_string()))
    }
}

async fn launch(config_path: &Path, sudo: &SudoArgs) -> Result<()> {
    let config = Config::load(config_path).await?;
    config.validate_for_fetch()?;

    if let Err(e) = fetch(config_path, sudo).await {
        warn!("Fetch failed: {}", e);
        warn!("Continuing with existing reports in {}", config.paths.output_dir.display());
    }

    run_dashboard(
        &config.app.host,
        config.app.port,
        config.paths.output_dir.clone(),
        config.app.reload_interval(),
    )
    .await
}

async fn run_dashboard(host: &str, port: u16, output_dir: PathBuf, reload: Option<Duration>) -> Result<()> {
    let state = Arc::new(DashboardState::load(output_dir).await?);
    let addr = bind_addr(host, port).await?;

    let display_host = if addr.ip().is_unspecified() {
        "localhost".to_string()
    } else {
        host.to_string()
    };
    info!("Dashboard available at:");
    info!("  Overview:       http://{}:{}/", display_host, port);
    info!("  OSDs by server: http://{}:{}/osds-by-server", display_host, port);
    if addr.ip().is_unspecified() {
        if let Ok(name) = hostname::get() {
            info!("  Network:        http://{}:{}/", name.to_string_lossy(), port);
        }
    }

    if let Some(every) = reload {
        info!("  Reports reread every {}s", every.as_secs());
        spawn_reloader(state.clone(), every);
    }

    serve(state, addr).await
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &GlobalArgs) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "hyper_util=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries only the collector's completion line
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
