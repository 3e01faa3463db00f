//! Report Rendering
//!
//! Serialises a [`NodeReport`] into the markdown report file. Section
//! titles double as anchors for the parser, so they live here as
//! constants shared by both sides.

use std::path::Path;

use tracing::debug;

use super::table::{render_table, DETAILED_COLUMNS, MAPPING_COLUMNS, POOL_COLUMNS};
use crate::domain::report::{NodeReport, BLOCK_NOT_AVAILABLE};
use crate::error::Result;

pub const TITLE: &str = "Ceph Cluster Information";
pub const CLUSTER_STATUS: &str = "Cluster Status";
pub const CEPH_VERSION: &str = "Ceph Version";
pub const CLUSTER_HEALTH: &str = "Cluster Health";
pub const OSD_TREE: &str = "OSD Tree";
pub const OSD_UTILIZATION: &str = "OSD Utilization";
pub const LOCAL_OSDS: &str = "Local OSDs";
pub const DEVICE_MAPPING: &str = "OSD to Device Mapping";
pub const DETAILED_DISKS: &str = "Detailed Disk Information";
pub const POOL_USAGE: &str = "Pool Usage";
pub const PG_STATUS: &str = "Placement Group Status";
pub const BLOCK_DEVICES: &str = "All Block Devices";
pub const LVM_PVS: &str = "LVM Physical Volumes";
pub const LVM_VGS: &str = "LVM Volume Groups";
pub const LVM_LVS: &str = "LVM Logical Volumes";
pub const CRUSH_RULES: &str = "CRUSH Rules";

/// Prefix of the local OSD list line
pub const LOCAL_OSDS_PREFIX: &str = "This server hosts the following OSDs:";

/// Timestamp format of the `Generated:` line
pub const GENERATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn section(out: &mut String, title: &str) {
    out.push_str(&format!("### {}\n\n", title));
}

fn fenced(out: &mut String, title: &str, content: &str) {
    section(out, title);
    let content = content.trim_end();
    let content = if content.trim().is_empty() {
        BLOCK_NOT_AVAILABLE
    } else {
        content
    };
    out.push_str("```\n");
    out.push_str(content);
    out.push_str("\n```\n\n");
}

/// Render the whole report
pub fn render_report(report: &NodeReport) -> String {
    let blocks = &report.blocks;
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", TITLE));
    out.push_str(&format!("Node: {}\n", report.node));
    out.push_str(&format!(
        "Generated: {}\n\n",
        report.generated_at.format(GENERATED_FORMAT)
    ));

    fenced(&mut out, CLUSTER_STATUS, &blocks.status);
    fenced(&mut out, CEPH_VERSION, &blocks.version);
    fenced(&mut out, CLUSTER_HEALTH, &blocks.health);
    fenced(&mut out, OSD_TREE, &blocks.osd_tree);
    fenced(&mut out, OSD_UTILIZATION, &blocks.osd_utilization);

    section(&mut out, LOCAL_OSDS);
    out.push_str(&format!(
        "{} {}\n\n",
        LOCAL_OSDS_PREFIX,
        report.local_units.join(", ")
    ));

    section(&mut out, DEVICE_MAPPING);
    out.push_str(&render_table(&MAPPING_COLUMNS, &report.units));
    out.push('\n');

    section(&mut out, DETAILED_DISKS);
    out.push_str(&render_table(&DETAILED_COLUMNS, &report.units));
    out.push('\n');

    section(&mut out, POOL_USAGE);
    out.push_str(&render_table(&POOL_COLUMNS, &report.pools));
    out.push('\n');

    fenced(&mut out, PG_STATUS, &blocks.pg_status);
    fenced(&mut out, BLOCK_DEVICES, &blocks.block_devices);
    fenced(&mut out, LVM_PVS, &blocks.physical_volumes);
    fenced(&mut out, LVM_VGS, &blocks.volume_groups);
    fenced(&mut out, LVM_LVS, &blocks.logical_volumes);
    fenced(&mut out, CRUSH_RULES, &blocks.crush_rules);

    out
}

/// Render and write the report, replacing any previous file.
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so a reader never sees a half-written report.
pub async fn write_report(report: &NodeReport, path: &Path) -> Result<()> {
    let content = render_report(report);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = std::path::PathBuf::from(staging);

    tokio::fs::write(&staging, content.as_bytes()).await?;
    tokio::fs::rename(&staging, path).await?;

    debug!(path = %path.display(), bytes = content.len(), "Report file replaced");
    Ok(())
}
