//! In-memory Host Adapter
//!
//! Implements the `NodeHost` port from canned command outputs and an
//! in-memory filesystem. Used by tests to describe a storage node without
//! touching the machine.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::ports::{format_command, CommandOutput, NodeHost};
use crate::error::{Error, Result};

/// Canned node description.
///
/// Commands are matched on their full command line
/// (`"ceph-volume lvm list 0 --format json"`). Unmatched commands exit 1.
#[derive(Debug, Default)]
pub struct MockHost {
    hostname: String,
    tools: HashSet<String>,
    commands: HashMap<String, CommandOutput>,
    files: HashMap<PathBuf, String>,
    links: HashMap<PathBuf, PathBuf>,
    dirs: HashMap<PathBuf, Vec<String>>,
    devices: HashSet<PathBuf>,
    invocations: RwLock<Vec<String>>,
}

impl MockHost {
    /// Create an empty host named `hostname`
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    /// Create a host with `ceph`, `ceph-volume`, `lsblk` and `lvs` installed
    pub fn with_required_tools(hostname: impl Into<String>) -> Self {
        Self::new(hostname)
            .with_tool("ceph")
            .with_tool("ceph-volume")
            .with_tool("lsblk")
            .with_tool("lvs")
    }

    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tools.insert(tool.to_string());
        self
    }

    pub fn without_tool(mut self, tool: &str) -> Self {
        self.tools.remove(tool);
        self
    }

    /// Register a successful command
    pub fn with_command(mut self, command_line: &str, stdout: impl Into<String>) -> Self {
        self.commands
            .insert(command_line.to_string(), CommandOutput::ok(stdout));
        self
    }

    /// Register a failing command
    pub fn with_failing_command(mut self, command_line: &str, stderr: &str) -> Self {
        self.commands
            .insert(command_line.to_string(), CommandOutput::failed(1, stderr));
        self
    }

    /// Add a regular file
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Add a symbolic link
    pub fn with_link(mut self, path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        self.links.insert(path.into(), target.into());
        self
    }

    /// Add a directory listing
    pub fn with_dir(mut self, path: impl Into<PathBuf>, entries: &[&str]) -> Self {
        self.dirs
            .insert(path.into(), entries.iter().map(|e| e.to_string()).collect());
        self
    }

    /// Mark a device node as present
    pub fn with_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.devices.insert(path.into());
        self
    }

    /// Command lines run so far, in order
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.read().clone()
    }

    /// Check whether a command line was run
    pub fn was_invoked(&self, command_line: &str) -> bool {
        self.invocations.read().iter().any(|c| c == command_line)
    }

    fn not_found(path: &Path) -> Error {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    }
}

#[async_trait]
impl NodeHost for MockHost {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = format_command(program, args);
        self.invocations.write().push(line.clone());

        if !self.tools.contains(program) {
            return Err(Error::CommandFailure {
                command: line,
                reason: "No such file or directory".to_string(),
            });
        }

        Ok(self
            .commands
            .get(&line)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(1, "no canned output")))
    }

    async fn has_tool(&self, program: &str) -> bool {
        self.tools.contains(program)
    }

    async fn exists(&self, path: &Path) -> bool {
        if self.devices.contains(path) || self.files.contains_key(path) || self.dirs.contains_key(path)
        {
            return true;
        }
        match self.links.get(path) {
            Some(target) => {
                self.devices.contains(target.as_path()) || self.files.contains_key(target.as_path())
            }
            None => false,
        }
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        self.links
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    async fn hostname(&self) -> String {
        self.hostname.clone()
    }
}
