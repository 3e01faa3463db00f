//! Error types for cephscope

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while collecting, fetching or serving reports.
///
/// Failures of individual inspection commands and parse mismatches are not
/// represented here: the collector recovers from them locally by
/// substituting sentinel values.
#[derive(Error, Debug)]
pub enum Error {
    /// A required external tool is not installed on the node
    #[error("Required tool '{tool}' not found in PATH. {remediation}")]
    MissingTool { tool: String, remediation: String },

    /// An external command could not be run or exited unsuccessfully
    #[error("Command '{command}' failed: {reason}")]
    CommandFailure { command: String, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remote server could not be reached or its collection failed
    #[error("Remote server {server} failed: {reason}")]
    Remote { server: String, reason: String },

    /// Dashboard server error
    #[error("Dashboard server error: {0}")]
    Server(String),

    /// Prometheus registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a `MissingTool` error with the stock remediation hint
    pub fn missing_tool(tool: impl Into<String>) -> Self {
        let tool = tool.into();
        let package = match tool.as_str() {
            "ceph" => "ceph-common",
            "ceph-volume" => "ceph-volume (ceph-osd)",
            "lsblk" => "util-linux",
            _ => "the package providing it",
        };
        Self::MissingTool {
            remediation: format!("Install {} on this node and re-run the collection.", package),
            tool,
        }
    }

    /// True when the error aborts a collection run before any output exists
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(self, Error::MissingTool { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_message_names_package() {
        let err = Error::missing_tool("lsblk");
        let msg = err.to_string();
        assert!(msg.contains("'lsblk'"));
        assert!(msg.contains("util-linux"));
        assert!(err.is_fatal_precondition());
    }

    #[test]
    fn test_command_failure_is_not_fatal() {
        let err = Error::CommandFailure {
            command: "ceph status".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert!(!err.is_fatal_precondition());
        assert_eq!(err.to_string(), "Command 'ceph status' failed: exit status 1");
    }

    #[test]
    fn test_json_error_converts() {
        fn parse(text: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_str(text)?)
        }
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
        assert!(!err.is_fatal_precondition());
    }
}
