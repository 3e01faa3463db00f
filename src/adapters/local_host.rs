//! Local Host Adapter
//!
//! Implements the `NodeHost` port against the machine the process runs on.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::ports::{format_command, CommandOutput, NodeHost};
use crate::error::{Error, Result};

/// The node this process is running on
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeHost for LocalHost {
    #[instrument(skip(self))]
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::CommandFailure {
                command: format_command(program, args),
                reason: e.to_string(),
            })?;

        debug!(status = ?output.status, "Command finished");

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn has_tool(&self, program: &str) -> bool {
        let Some(paths) = std::env::var_os("PATH") else {
            return false;
        };
        for dir in std::env::split_paths(&paths) {
            if is_executable(&dir.join(program)).await {
                return true;
            }
        }
        false
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        Ok(tokio::fs::read_link(path).await?)
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn hostname(&self) -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .ok()
            .and_then(|h| h.split('.').next().map(str::to_string))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(unix)]
async fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
async fn is_executable(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::NodeHostExt;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let host = LocalHost::new();
        let result = host.run("cephscope-definitely-not-installed", &[]).await;
        assert!(matches!(result, Err(Error::CommandFailure { .. })));

        let captured = host.capture("cephscope-definitely-not-installed", &[]).await;
        assert!(captured.is_none());
        assert!(!host.has_tool("cephscope-definitely-not-installed").await);
    }

    #[tokio::test]
    async fn test_filesystem_operations() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("model");
        tokio::fs::write(&file, "ST4000NM0035\n").await.unwrap();

        let host = LocalHost::new();
        assert!(host.exists(&file).await);
        assert_eq!(host.read_trimmed(&file).await.as_deref(), Some("ST4000NM0035"));
        assert_eq!(host.list_dir(dir.path()).await.unwrap(), vec!["model".to_string()]);
        assert!(host.follow_link(&file).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_follow_relative_link() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sdb1");
        tokio::fs::write(&target, "").await.unwrap();
        let link = dir.path().join("block.db");
        std::os::unix::fs::symlink("sdb1", &link).unwrap();

        let host = LocalHost::new();
        assert_eq!(host.follow_link(&link).await, Some(target));
    }
}
