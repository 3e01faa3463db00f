//! Domain Ports
//!
//! Trait abstractions for everything the collector and the aggregator touch
//! outside the process: the node's commands and filesystem, and remote
//! servers reached over SSH.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │   NodeHost  │  RemoteConnector  │  RemoteSession    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │   LocalHost  │  MockHost  │  OpenSshConnector       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::config::ServerEntry;
use crate::error::Result;

// =============================================================================
// Command Output
// =============================================================================

/// Captured result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Trimmed stdout of a successful run, `None` if it failed or was empty
    pub fn useful_stdout(&self) -> Option<String> {
        let out = self.stdout.trim();
        if self.success() && !out.is_empty() {
            Some(out.to_string())
        } else {
            None
        }
    }
}

// =============================================================================
// Node Host Port
// =============================================================================

/// Port for inspecting the node the collector runs on.
///
/// Every operation is a plain blocking-style await with no timeout: a hung
/// command stalls the collection run.
#[async_trait]
pub trait NodeHost: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// Returns `Err` only when the process could not be started at all; a
    /// non-zero exit is reported through [`CommandOutput::status`].
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Check whether `program` is an executable on `PATH`
    async fn has_tool(&self, program: &str) -> bool;

    /// Check whether a path exists (symlinks are followed)
    async fn exists(&self, path: &Path) -> bool;

    /// Read a whole file
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Read one level of a symbolic link
    async fn read_link(&self, path: &Path) -> Result<PathBuf>;

    /// Entry names of a directory
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Short host name of the node
    async fn hostname(&self) -> String;
}

/// Convenience layer over [`NodeHost`] that turns every failure mode into
/// "field unavailable".
#[async_trait]
pub trait NodeHostExt: NodeHost {
    /// Useful stdout of a command, `None` on spawn failure, non-zero exit or
    /// empty output.
    async fn capture(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.run(program, args).await {
            Ok(output) => {
                let out = output.useful_stdout();
                if out.is_none() {
                    debug!(
                        command = %format_command(program, args),
                        status = ?output.status,
                        stderr = %output.stderr.trim(),
                        "Command produced no usable output"
                    );
                }
                out
            }
            Err(e) => {
                debug!(command = %format_command(program, args), error = %e, "Command could not be run");
                None
            }
        }
    }

    /// Trimmed file content, `None` when unreadable or empty
    async fn read_trimmed(&self, path: &Path) -> Option<String> {
        match self.read_to_string(path).await {
            Ok(content) => {
                let content = content.trim();
                (!content.is_empty()).then(|| content.to_string())
            }
            Err(_) => None,
        }
    }

    /// Follow a symbolic link one level, resolving relative targets against
    /// the link's directory. `None` if `path` is not a link.
    async fn follow_link(&self, path: &Path) -> Option<PathBuf> {
        let target = self.read_link(path).await.ok()?;
        if target.is_absolute() {
            Some(target)
        } else {
            Some(path.parent().unwrap_or(Path::new("/")).join(target))
        }
    }
}

impl<T: NodeHost + ?Sized> NodeHostExt for T {}

/// Render a command line for logs and mock lookups
pub fn format_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

// =============================================================================
// Remote Ports
// =============================================================================

/// An open session with one remote server
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Execute a shell command line remotely, feeding `stdin` if given
    async fn exec(&self, command: &str, stdin: Option<&str>) -> Result<CommandOutput>;

    /// Copy a remote file to a local path
    async fn download(&self, remote: &str, local: &Path) -> Result<()>;

    /// Close the session
    async fn disconnect(&self);
}

/// Port for opening sessions to configured servers
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, server: &ServerEntry) -> Result<Box<dyn RemoteSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_useful_stdout() {
        assert_eq!(CommandOutput::ok("  sda \n").useful_stdout(), Some("sda".to_string()));
        assert_eq!(CommandOutput::ok("\n").useful_stdout(), None);
        assert_eq!(CommandOutput::failed(1, "boom").useful_stdout(), None);

        let mut partial = CommandOutput::ok("data");
        partial.status = None;
        assert_eq!(partial.useful_stdout(), None);
    }

    #[test]
    fn test_format_command() {
        assert_eq!(format_command("ceph", &[]), "ceph");
        assert_eq!(format_command("ceph", &["osd", "tree"]), "ceph osd tree");
    }
}
