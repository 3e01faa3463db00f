//! OpenSSH Remote Adapter
//!
//! Implements the `RemoteConnector` port by driving the system `ssh` and
//! `scp` clients in batch mode. Each remote command is its own ssh process;
//! a session only carries the connection parameters.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::{ServerEntry, SshConfig};
use crate::domain::ports::{CommandOutput, RemoteConnector, RemoteSession};
use crate::error::{Error, Result};

/// Connection parameters shared by every server
#[derive(Debug, Clone)]
pub struct OpenSshConnector {
    username: String,
    key_file: PathBuf,
    port: u16,
    connect_timeout: Duration,
}

impl OpenSshConnector {
    /// Build a connector from the ssh config section.
    ///
    /// Fails when the username or key file is missing.
    pub fn from_config(ssh: &SshConfig) -> Result<Self> {
        let username = ssh
            .username
            .clone()
            .ok_or_else(|| Error::Config("ssh.username is required".to_string()))?;
        let key_file = ssh
            .key_path()
            .ok_or_else(|| Error::Config("ssh.key_file is required".to_string()))?;

        if !key_file.exists() {
            return Err(Error::Config(format!(
                "SSH key file {} not found",
                key_file.display()
            )));
        }
        if ssh.key_requires_password {
            warn!(
                "Key {} is passphrase-protected; it must be loaded into ssh-agent for batch mode",
                key_file.display()
            );
        }

        Ok(Self {
            username,
            key_file,
            port: ssh.port,
            connect_timeout: ssh.connect_timeout(),
        })
    }

    fn options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_file.to_string_lossy().into_owned(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
        ]
    }
}

#[async_trait]
impl RemoteConnector for OpenSshConnector {
    #[instrument(skip(self), fields(server = %server.name))]
    async fn connect(&self, server: &ServerEntry) -> Result<Box<dyn RemoteSession>> {
        let session = OpenSshSession {
            server: server.name.clone(),
            target: format!("{}@{}", self.username, server.address),
            port: self.port,
            options: self.options(),
        };

        let check = session.exec("true", None).await?;
        if !check.success() {
            return Err(Error::Remote {
                server: server.name.clone(),
                reason: format!("connection failed: {}", check.stderr.trim()),
            });
        }

        debug!("Connected to {} ({})", server.name, server.address);
        Ok(Box::new(session))
    }
}

/// Parameters for reaching one server
#[derive(Debug, Clone)]
struct OpenSshSession {
    server: String,
    target: String,
    port: u16,
    options: Vec<String>,
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    async fn exec(&self, command: &str, stdin: Option<&str>) -> Result<CommandOutput> {
        let mut child = Command::new("ssh")
            .args(&self.options)
            .arg("-p")
            .arg(self.port.to_string())
            .arg(&self.target)
            .arg("--")
            .arg(command)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Remote {
                server: self.server.clone(),
                reason: format!("could not start ssh: {}", e),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let output = Command::new("scp")
            .args(&self.options)
            .arg("-P")
            .arg(self.port.to_string())
            .arg(format!("{}:{}", self.target, remote))
            .arg(local)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Remote {
                server: self.server.clone(),
                reason: format!("could not start scp: {}", e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Remote {
                server: self.server.clone(),
                reason: format!(
                    "download of {} failed: {}",
                    remote,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    async fn disconnect(&self) {
        debug!(server = %self.server, "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_from_config_requires_existing_key() {
        let ssh = SshConfig {
            username: Some("ceph-admin".to_string()),
            key_file: Some("/nonexistent/cephscope/id_rsa".to_string()),
            ..Default::default()
        };
        assert_matches!(OpenSshConnector::from_config(&ssh), Err(Error::Config(msg)) if msg.contains("not found"));

        let ssh = SshConfig::default();
        assert_matches!(OpenSshConnector::from_config(&ssh), Err(Error::Config(_)));
    }

    #[test]
    fn test_options_carry_key_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_ed25519");
        std::fs::write(&key, "key").unwrap();

        let ssh = SshConfig {
            username: Some("ceph-admin".to_string()),
            key_file: Some(key.to_string_lossy().into_owned()),
            connect_timeout_secs: 5,
            ..Default::default()
        };
        let connector = OpenSshConnector::from_config(&ssh).unwrap();
        let options = connector.options();

        assert!(options.contains(&key.to_string_lossy().into_owned()));
        assert!(options.contains(&"BatchMode=yes".to_string()));
        assert!(options.contains(&"ConnectTimeout=5".to_string()));
    }
}
