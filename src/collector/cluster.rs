//! Cluster-wide Information
//!
//! Verbatim command blocks for the report, discovery of the OSDs hosted
//! on this node, and pool usage rows from `ceph df`.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::capabilities::Capabilities;
use super::devices::{format_bytes, parse_size_to_bytes};
use crate::domain::ports::{NodeHost, NodeHostExt};
use crate::domain::record::UNKNOWN;
use crate::domain::report::{ClusterBlocks, PoolUsage, BLOCK_NOT_AVAILABLE};

/// `POOL ID PGS STORED OBJECTS USED %USED MAX AVAIL`
static MODERN_POOL_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(\S+)\s+\d+\s+\d+\s+([\d.]+\s?[KMGTPE]?i?B)\s+[\d.]+\s?[kKMGTPE]?\s+([\d.]+\s?[KMGTPE]?i?B)\s+([\d.]+)\s+([\d.]+\s?[KMGTPE]?i?B)",
    )
    .unwrap()
});

/// `NAME ID USED %USED MAX AVAIL OBJECTS`
static LEGACY_POOL_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s+\d+\s+([\d.]+[KMGTPE]?)\s+([\d.]+)\s+([\d.]+[KMGTPE]?)\s+\d+\s*$").unwrap()
});

// =============================================================================
// Cluster blocks
// =============================================================================

/// Wraps `ceph` so that a non-default cluster name is passed through
#[derive(Debug, Clone)]
pub struct CephCli {
    cluster: String,
}

impl CephCli {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    fn args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if self.cluster != "ceph" {
            full.push("--cluster");
            full.push(self.cluster.as_str());
        }
        full.extend_from_slice(args);
        full
    }

    /// Useful stdout of `ceph <args>`
    pub async fn capture<H: NodeHost + ?Sized>(&self, host: &H, args: &[&str]) -> Option<String> {
        host.capture("ceph", &self.args(args)).await
    }
}

async fn block<H: NodeHost + ?Sized>(host: &H, program: &str, args: &[&str]) -> String {
    host.capture(program, args)
        .await
        .unwrap_or_else(|| BLOCK_NOT_AVAILABLE.to_string())
}

async fn ceph_block<H: NodeHost + ?Sized>(host: &H, ceph: &CephCli, args: &[&str]) -> String {
    ceph.capture(host, args)
        .await
        .unwrap_or_else(|| BLOCK_NOT_AVAILABLE.to_string())
}

/// Capture every verbatim block of the report
pub async fn collect_blocks<H: NodeHost + ?Sized>(host: &H, ceph: &CephCli) -> ClusterBlocks {
    ClusterBlocks {
        status: ceph_block(host, ceph, &["status"]).await,
        version: ceph_block(host, ceph, &["version"]).await,
        health: ceph_block(host, ceph, &["health", "detail"]).await,
        osd_tree: ceph_block(host, ceph, &["osd", "tree"]).await,
        osd_utilization: ceph_block(host, ceph, &["osd", "df"]).await,
        pg_status: ceph_block(host, ceph, &["pg", "stat"]).await,
        block_devices: block(host, "lsblk", &[]).await,
        physical_volumes: block(host, "pvs", &[]).await,
        volume_groups: block(host, "vgs", &[]).await,
        logical_volumes: block(host, "lvs", &[]).await,
        crush_rules: ceph_block(host, ceph, &["osd", "crush", "rule", "dump"]).await,
    }
}

// =============================================================================
// Local OSDs
// =============================================================================

/// OSD ids hosted on this node, numerically sorted.
///
/// Data directories named `<cluster>-<id>` under `osd_root` come first;
/// when there are none, `ceph osd ls-tree <node>` is asked.
pub async fn local_units<H: NodeHost + ?Sized>(
    host: &H,
    ceph: &CephCli,
    osd_root: &Path,
    node: &str,
) -> Vec<String> {
    let prefix = format!("{}-", ceph.cluster);
    let mut ids: Vec<String> = match host.list_dir(osd_root).await {
        Ok(entries) => entries
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix))
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect(),
        Err(e) => {
            debug!(root = %osd_root.display(), error = %e, "Cannot list OSD data directories");
            Vec::new()
        }
    };

    if ids.is_empty() {
        if let Some(out) = ceph.capture(host, &["osd", "ls-tree", node]).await {
            ids = out
                .split_whitespace()
                .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string)
                .collect();
        }
    }

    if ids.is_empty() {
        warn!(node, "No OSDs found on this node");
    }

    ids.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
    ids.dedup();
    ids
}

// =============================================================================
// Pools
// =============================================================================

#[derive(Debug, Deserialize)]
struct DfReport {
    #[serde(default)]
    pools: Vec<DfPool>,
}

#[derive(Debug, Deserialize)]
struct DfPool {
    name: String,
    stats: DfPoolStats,
}

#[derive(Debug, Deserialize)]
struct DfPoolStats {
    #[serde(default)]
    bytes_used: Option<u64>,
    #[serde(default)]
    stored: Option<u64>,
    #[serde(default)]
    max_avail: u64,
    /// Fraction in `[0, 1]`
    #[serde(default)]
    percent_used: f64,
}

/// Pool usage rows from `ceph df`
pub async fn pool_usage<H: NodeHost + ?Sized>(host: &H, ceph: &CephCli, caps: Capabilities) -> Vec<PoolUsage> {
    if caps.json_processor {
        if let Some(out) = ceph.capture(host, &["df", "--format", "json"]).await {
            if let Some(pools) = parse_df_json(&out) {
                return pools;
            }
            debug!("ceph df JSON did not parse, trying text output");
        }
    }

    match ceph.capture(host, &["df"]).await {
        Some(out) => parse_df_text(&out),
        None => Vec::new(),
    }
}

/// Parse `ceph df --format json`
pub fn parse_df_json(text: &str) -> Option<Vec<PoolUsage>> {
    let report: DfReport = serde_json::from_str(text).ok()?;
    Some(
        report
            .pools
            .into_iter()
            .map(|pool| {
                let used = pool.stats.bytes_used.or(pool.stats.stored).unwrap_or(0);
                let avail = pool.stats.max_avail;
                PoolUsage {
                    name: pool.name,
                    size: format_bytes(used.saturating_add(avail)),
                    used: format_bytes(used),
                    available: format_bytes(avail),
                    percent_used: format!("{:.2}", pool.stats.percent_used * 100.0),
                }
            })
            .collect(),
    )
}

/// Parse the text `ceph df` pool section, modern or legacy layout
pub fn parse_df_text(text: &str) -> Vec<PoolUsage> {
    let mut in_pools = false;
    let mut pools = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.trim_matches('-').trim().starts_with("POOLS") {
            in_pools = true;
            continue;
        }
        if !in_pools || trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("---") {
            break;
        }

        if let Some(caps) = MODERN_POOL_ROW.captures(line) {
            pools.push(pool_row(&caps[1], &caps[3], &caps[5], &caps[4]));
        } else if let Some(caps) = LEGACY_POOL_ROW.captures(line) {
            pools.push(pool_row(&caps[1], &caps[2], &caps[4], &caps[3]));
        }
    }

    pools
}

fn pool_row(name: &str, used: &str, available: &str, percent: &str) -> PoolUsage {
    let size = match (parse_size_to_bytes(used), parse_size_to_bytes(available)) {
        (Some(u), Some(a)) => format_bytes(u.saturating_add(a)),
        _ => UNKNOWN.to_string(),
    };
    PoolUsage {
        name: name.to_string(),
        size,
        used: used.to_string(),
        available: available.to_string(),
        percent_used: percent.to_string(),
    }
}
