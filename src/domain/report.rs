//! Node Reports
//!
//! A [`NodeReport`] is the immutable snapshot produced by one collection run
//! on one node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::StorageUnitRecord;

/// Placeholder for a text block whose command produced nothing
pub const BLOCK_NOT_AVAILABLE: &str = "Not available";

// =============================================================================
// Cluster Blocks
// =============================================================================

/// Raw command output captured verbatim for the report.
///
/// These are opaque to the rest of the system; the dashboard shows them as
/// preformatted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlocks {
    pub status: String,
    pub version: String,
    pub health: String,
    pub osd_tree: String,
    pub osd_utilization: String,
    pub pg_status: String,
    pub block_devices: String,
    pub physical_volumes: String,
    pub volume_groups: String,
    pub logical_volumes: String,
    pub crush_rules: String,
}

impl Default for ClusterBlocks {
    fn default() -> Self {
        let na = || BLOCK_NOT_AVAILABLE.to_string();
        Self {
            status: na(),
            version: na(),
            health: na(),
            osd_tree: na(),
            osd_utilization: na(),
            pg_status: na(),
            block_devices: na(),
            physical_volumes: na(),
            volume_groups: na(),
            logical_volumes: na(),
            crush_rules: na(),
        }
    }
}

// =============================================================================
// Pool Usage
// =============================================================================

/// One row of the pool usage table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUsage {
    pub name: String,
    /// Capacity visible to the pool (used + max available)
    pub size: String,
    pub used: String,
    pub available: String,
    pub percent_used: String,
}

// =============================================================================
// Node Report
// =============================================================================

/// Everything one collection run learned about one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Node (host) name
    pub node: String,
    /// When the collection finished
    pub generated_at: DateTime<Utc>,
    /// Cluster-wide command output
    pub blocks: ClusterBlocks,
    /// OSD ids hosted on this node, in collection order
    pub local_units: Vec<String>,
    /// One record per local OSD, same order as `local_units`
    pub units: Vec<StorageUnitRecord>,
    /// Pool usage rows
    pub pools: Vec<PoolUsage>,
}

impl NodeReport {
    /// Find a record by OSD id
    pub fn unit(&self, unit_id: &str) -> Option<&StorageUnitRecord> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }

    /// Number of OSDs whose device could not be resolved at all
    pub fn unresolved_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_unresolved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::NOT_AVAILABLE;

    #[test]
    fn test_default_blocks_are_placeholders() {
        let blocks = ClusterBlocks::default();
        assert_eq!(blocks.status, BLOCK_NOT_AVAILABLE);
        assert_eq!(blocks.crush_rules, BLOCK_NOT_AVAILABLE);
    }

    #[test]
    fn test_unit_lookup_and_unresolved_count() {
        let mut missing = StorageUnitRecord::unknown("1");
        missing.block_device_path = NOT_AVAILABLE.to_string();

        let report = NodeReport {
            node: "node-a".to_string(),
            generated_at: Utc::now(),
            blocks: ClusterBlocks::default(),
            local_units: vec!["0".to_string(), "1".to_string()],
            units: vec![StorageUnitRecord::unknown("0"), missing],
            pools: vec![],
        };

        assert!(report.unit("0").is_some());
        assert!(report.unit("9").is_none());
        assert_eq!(report.unresolved_count(), 1);
    }
}
