//! Group-by Presentation
//!
//! Partitions every node's records into SSD, HDD and Unknown buckets and
//! applies the dashboard's text filter. Views are built fresh from the
//! loaded reports and never modify them.

use serde::Serialize;

use crate::domain::record::{DeviceClass, StorageUnitRecord};
use crate::report::ParsedReport;

/// A record plus what the OSD tree says about it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedUnit {
    #[serde(flatten)]
    pub record: StorageUnitRecord,
    /// CRUSH device class from the OSD tree, if listed
    pub crush_class: Option<String>,
}

/// Records of one device class on one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassGroup {
    pub class: DeviceClass,
    pub units: Vec<GroupedUnit>,
}

/// One node's buckets in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGroup {
    pub node: String,
    pub classes: Vec<ClassGroup>,
}

impl NodeGroup {
    pub fn unit_count(&self) -> usize {
        self.classes.iter().map(|c| c.units.len()).sum()
    }

    pub fn class(&self, class: DeviceClass) -> Option<&ClassGroup> {
        self.classes.iter().find(|c| c.class == class)
    }
}

/// The grouped, optionally filtered, dashboard view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedView {
    pub filter: Option<String>,
    pub nodes: Vec<NodeGroup>,
}

impl GroupedView {
    /// Group `reports`, keeping only rows matching `filter`.
    ///
    /// The filter is a case-insensitive substring. A node whose name
    /// matches keeps all of its rows. Without a filter every node has all
    /// three buckets, empty or not; with one, nodes and buckets left
    /// without rows are dropped.
    pub fn build(reports: &[ParsedReport], filter: Option<&str>) -> Self {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());
        let needle = filter.map(str::to_lowercase);

        let nodes = reports
            .iter()
            .filter_map(|report| group_node(report, needle.as_deref()))
            .collect();

        Self {
            filter: filter.map(str::to_string),
            nodes,
        }
    }

    pub fn total_units(&self) -> usize {
        self.nodes.iter().map(NodeGroup::unit_count).sum()
    }

    /// Rows of `class` across all nodes
    pub fn class_count(&self, class: DeviceClass) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| n.class(class))
            .map(|c| c.units.len())
            .sum()
    }
}

fn group_node(report: &ParsedReport, needle: Option<&str>) -> Option<NodeGroup> {
    let node = report.node();
    let node_matches = needle.map_or(true, |n| node.to_lowercase().contains(n));

    let classes: Vec<ClassGroup> = DeviceClass::all()
        .into_iter()
        .map(|class| ClassGroup {
            class,
            units: report
                .report
                .units
                .iter()
                .filter(|u| u.device_class == class)
                .filter(|u| node_matches || needle.map_or(true, |n| u.matches(n)))
                .map(|u| GroupedUnit {
                    record: u.clone(),
                    crush_class: report.crush_classes.get(&u.unit_id).cloned(),
                })
                .collect(),
        })
        .filter(|group| needle.is_none() || !group.units.is_empty())
        .collect();

    (needle.is_none() || !classes.is_empty()).then(|| NodeGroup {
        node: node.to_string(),
        classes,
    })
}
