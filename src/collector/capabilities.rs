//! Tool Capability Detection
//!
//! Checked once at the start of a collection run and passed explicitly to
//! everything that changes behaviour depending on installed tools.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::ports::NodeHost;
use crate::error::{Error, Result};

/// Tools without which a collection run cannot start
pub const REQUIRED_TOOLS: [&str; 3] = ["ceph", "ceph-volume", "lsblk"];

/// Optional JSON processor
pub const JSON_PROCESSOR: &str = "jq";

/// Optional arbitrary-precision calculator
pub const CALCULATOR: &str = "bc";

/// Which optional tools are present on the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// A JSON processor is installed: request JSON output from
    /// `ceph-volume` and `ceph df` and parse it structurally
    pub json_processor: bool,
    /// A calculator is installed: byte counts are rendered as human sizes
    pub calculator: bool,
}

impl Capabilities {
    /// Everything available
    pub fn full() -> Self {
        Self {
            json_processor: true,
            calculator: true,
        }
    }

    /// Only the required tools
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Detect what the node provides.
    ///
    /// Returns `Error::MissingTool` for the first required tool not found.
    pub async fn detect<H: NodeHost + ?Sized>(host: &H) -> Result<Self> {
        for tool in REQUIRED_TOOLS {
            if !host.has_tool(tool).await {
                return Err(Error::missing_tool(tool));
            }
        }

        let caps = Self {
            json_processor: host.has_tool(JSON_PROCESSOR).await,
            calculator: host.has_tool(CALCULATOR).await,
        };

        if !caps.json_processor {
            warn!("{} not found, falling back to text parsing of ceph-volume output", JSON_PROCESSOR);
        }
        if !caps.calculator {
            warn!("{} not found, metadata sizes from byte counts stay in bytes", CALCULATOR);
        }
        info!(
            json_processor = caps.json_processor,
            calculator = caps.calculator,
            "Tool capabilities detected"
        );

        Ok(caps)
    }
}
