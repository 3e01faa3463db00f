//! Report Parsing
//!
//! Rebuilds node reports from the markdown files the collectors wrote.
//! Parsing is tolerant: a missing section or table yields empty data and
//! the rest of the file still parses. Nothing in here returns an error
//! for malformed content; only I/O can fail.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::table::{
    Column, Table, BLOCK_DEVICE, DB_DEVICE, DB_SIZE, DEVICE_PATH, DEVICE_TYPE, MODEL, OSD_ID, POOL_AVAILABLE,
    POOL_NAME, POOL_PERCENT, POOL_SIZE, POOL_USED, SIZE, WAL_DEVICE, WAL_SIZE,
};
use super::writer::{self, GENERATED_FORMAT, LOCAL_OSDS_PREFIX};
use crate::config::REPORT_FILE_PREFIX;
use crate::domain::record::{DeviceClass, StorageUnitRecord, UNKNOWN};
use crate::domain::report::{ClusterBlocks, NodeReport, PoolUsage, BLOCK_NOT_AVAILABLE};
use crate::error::Result;

/// `<id> <class> <weight> ...` rows of `ceph osd tree`
static OSD_TREE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+([A-Za-z][\w-]*)\s+-?[\d.]+\s").unwrap());

/// A report as loaded by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    #[serde(flatten)]
    pub report: NodeReport,
    /// File the report was read from
    pub source: PathBuf,
    /// CRUSH device class per OSD id, from the OSD tree block
    pub crush_classes: BTreeMap<String, String>,
}

impl ParsedReport {
    pub fn node(&self) -> &str {
        &self.report.node
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Lines before the first section and the lines of each `### ` section,
/// keyed by lower-cased title. Fenced content is never mistaken for a
/// section header.
struct Sections<'a> {
    preamble: Vec<&'a str>,
    bodies: HashMap<String, Vec<&'a str>>,
}

impl<'a> Sections<'a> {
    fn split(text: &'a str) -> Self {
        let mut preamble = Vec::new();
        let mut bodies: HashMap<String, Vec<&'a str>> = HashMap::new();
        let mut current: Option<String> = None;
        let mut in_fence = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                in_fence = !in_fence;
            } else if !in_fence {
                if let Some(title) = trimmed.strip_prefix("### ") {
                    let key = title.trim().to_lowercase();
                    bodies.entry(key.clone()).or_default();
                    current = Some(key);
                    continue;
                }
            }

            match &current {
                Some(key) => bodies.entry(key.clone()).or_default().push(line),
                None => preamble.push(line),
            }
        }

        Self { preamble, bodies }
    }

    fn body(&self, title: &str) -> Option<&[&'a str]> {
        self.bodies.get(&title.to_lowercase()).map(Vec::as_slice)
    }

    /// Table of a section; `None` when the section or its table is absent
    fn table(&self, title: &str) -> Option<Table> {
        let body = self.body(title)?;
        let start = body.iter().position(|l| l.trim_start().starts_with('|'))?;
        let lines = body[start..]
            .iter()
            .take_while(|l| l.trim_start().starts_with('|'))
            .copied();
        Table::parse(lines)
    }

    /// Content of the first fenced block of a section
    fn block(&self, title: &str) -> String {
        let Some(body) = self.body(title) else {
            return BLOCK_NOT_AVAILABLE.to_string();
        };

        let mut inside = false;
        let mut content = Vec::new();
        for line in body {
            if line.trim().starts_with("```") {
                if inside {
                    break;
                }
                inside = true;
                continue;
            }
            if inside {
                content.push(*line);
            }
        }

        let content = content.join("\n");
        if content.trim().is_empty() {
            BLOCK_NOT_AVAILABLE.to_string()
        } else {
            content
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse report text. `fallback_node` is used when there is no `Node:` line.
pub fn parse_report(text: &str, fallback_node: &str) -> NodeReport {
    let sections = Sections::split(text);

    let node = sections
        .preamble
        .iter()
        .find_map(|l| l.trim().strip_prefix("Node:"))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback_node)
        .to_string();

    let generated_at = sections
        .preamble
        .iter()
        .find_map(|l| l.trim().strip_prefix("Generated:"))
        .and_then(|ts| parse_timestamp(ts.trim()))
        .unwrap_or_default();

    let blocks = ClusterBlocks {
        status: sections.block(writer::CLUSTER_STATUS),
        version: sections.block(writer::CEPH_VERSION),
        health: sections.block(writer::CLUSTER_HEALTH),
        osd_tree: sections.block(writer::OSD_TREE),
        osd_utilization: sections.block(writer::OSD_UTILIZATION),
        pg_status: sections.block(writer::PG_STATUS),
        block_devices: sections.block(writer::BLOCK_DEVICES),
        physical_volumes: sections.block(writer::LVM_PVS),
        volume_groups: sections.block(writer::LVM_VGS),
        logical_volumes: sections.block(writer::LVM_LVS),
        crush_rules: sections.block(writer::CRUSH_RULES),
    };

    let listed = local_unit_list(&sections);
    let mut units = parse_units(
        sections.table(writer::DETAILED_DISKS),
        sections.table(writer::DEVICE_MAPPING),
    );

    let local_units = match listed {
        Some(ids) => {
            for id in &ids {
                if !units.iter().any(|u| &u.unit_id == id) {
                    debug!(node = %node, unit = %id, "Local OSD without table row");
                    units.push(StorageUnitRecord::unknown(id.as_str()));
                }
            }
            ids
        }
        None => units.iter().map(|u| u.unit_id.clone()).collect(),
    };

    let pools = parse_pools(sections.table(writer::POOL_USAGE));

    NodeReport {
        node,
        generated_at,
        blocks,
        local_units,
        units,
        pools,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, GENERATED_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc)))
}

fn local_unit_list(sections: &Sections<'_>) -> Option<Vec<String>> {
    let body = sections.body(writer::LOCAL_OSDS)?;
    let line = body.iter().find_map(|l| l.trim().strip_prefix(LOCAL_OSDS_PREFIX))?;
    Some(
        line.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Records from the detailed table, with the block volume merged in from
/// the mapping table. OSDs only present in the mapping table are kept.
fn parse_units(detailed: Option<Table>, mapping: Option<Table>) -> Vec<StorageUnitRecord> {
    let mut units: Vec<StorageUnitRecord> = Vec::new();

    if let Some(table) = &detailed {
        for row in &table.rows {
            let Some(id) = table.cell(row, &OSD_ID).filter(|id| !id.is_empty()) else {
                continue;
            };
            let mut record = StorageUnitRecord::unknown(id);
            set(&mut record.block_device_path, table.cell(row, &DEVICE_PATH));
            if let Some(class) = table.cell(row, &DEVICE_TYPE) {
                record.device_class = DeviceClass::parse(class);
            }
            set(&mut record.size, table.cell(row, &SIZE));
            set(&mut record.model, table.cell(row, &MODEL));
            set(&mut record.metadata_device_path, table.cell(row, &DB_DEVICE));
            set(&mut record.metadata_device_size, table.cell(row, &DB_SIZE));
            set(&mut record.log_device_path, table.cell(row, &WAL_DEVICE));
            set(&mut record.log_device_size, table.cell(row, &WAL_SIZE));
            units.push(record);
        }
    }

    if let Some(table) = &mapping {
        for row in &table.rows {
            let Some(id) = table.cell(row, &OSD_ID).filter(|id| !id.is_empty()) else {
                continue;
            };
            match units.iter_mut().find(|u| u.unit_id == id) {
                Some(record) => set(&mut record.block_volume, table.cell(row, &BLOCK_DEVICE)),
                None => {
                    let mut record = StorageUnitRecord::unknown(id);
                    set(&mut record.block_volume, table.cell(row, &BLOCK_DEVICE));
                    set(&mut record.block_device_path, table.cell(row, &DEVICE_PATH));
                    if let Some(class) = table.cell(row, &DEVICE_TYPE) {
                        record.device_class = DeviceClass::parse(class);
                    }
                    set(&mut record.metadata_device_path, table.cell(row, &DB_DEVICE));
                    set(&mut record.log_device_path, table.cell(row, &WAL_DEVICE));
                    units.push(record);
                }
            }
        }
    }

    units.into_iter().map(StorageUnitRecord::normalized).collect()
}

fn set(field: &mut String, cell: Option<&str>) {
    if let Some(value) = cell {
        *field = value.to_string();
    }
}

fn parse_pools(table: Option<Table>) -> Vec<PoolUsage> {
    let Some(table) = table else {
        return Vec::new();
    };

    table
        .rows
        .iter()
        .filter(|row| table.cell(row, &POOL_NAME).is_some_and(|n| !n.is_empty()))
        .map(|row| PoolUsage {
            name: pool_cell(&table, row, &POOL_NAME),
            size: pool_cell(&table, row, &POOL_SIZE),
            used: pool_cell(&table, row, &POOL_USED),
            available: pool_cell(&table, row, &POOL_AVAILABLE),
            percent_used: pool_cell(&table, row, &POOL_PERCENT),
        })
        .collect()
}

fn pool_cell(table: &Table, row: &[String], column: &Column<PoolUsage>) -> String {
    table
        .cell(row, column)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// CRUSH device class per OSD id from an OSD tree block
pub fn crush_classes(osd_tree: &str) -> BTreeMap<String, String> {
    osd_tree
        .lines()
        .filter_map(|line| OSD_TREE_ROW.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

// =============================================================================
// Files
// =============================================================================

/// Node name encoded in a report file name, if it follows the convention
pub fn node_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(REPORT_FILE_PREFIX)?
        .strip_suffix(".md")
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Parse one report file
pub async fn parse_report_file(path: &Path) -> Result<ParsedReport> {
    let text = tokio::fs::read_to_string(path).await?;
    let fallback = node_from_file_name(path)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let report = parse_report(&text, &fallback);
    let crush_classes = crush_classes(&report.blocks.osd_tree);

    Ok(ParsedReport {
        report,
        source: path.to_path_buf(),
        crush_classes,
    })
}

/// Report files in `dir`, sorted by name
pub async fn discover_reports(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if node_from_file_name(&path).is_some() && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Load every report in `dir`; unreadable files are skipped with a warning
pub async fn load_reports(dir: &Path) -> Vec<ParsedReport> {
    let paths = match discover_reports(dir).await {
        Ok(paths) => paths,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot read report directory");
            return Vec::new();
        }
    };

    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        match parse_report_file(&path).await {
            Ok(report) => reports.push(report),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable report"),
        }
    }
    reports
}
