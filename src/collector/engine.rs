//! Collector Engine
//!
//! Runs on a storage node: checks preconditions, captures the cluster
//! blocks, resolves every local OSD one after the other, and assembles a
//! [`NodeReport`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::capabilities::Capabilities;
use super::cluster::{collect_blocks, local_units, pool_usage, CephCli};
use super::companion::{resolve_companion, CompanionKind};
use super::devices::{classify, size_and_model};
use super::metadata::OsdMetadata;
use super::resolver::{data_dir, DeviceResolver, UnitContext};
use crate::domain::ports::NodeHost;
use crate::domain::record::{StorageUnitRecord, NOT_AVAILABLE};
use crate::domain::report::NodeReport;
use crate::error::Result;
use crate::report::write_report;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a collection run
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Directory holding the `<cluster>-<id>` OSD data directories
    pub osd_root: PathBuf,

    /// Cluster name, used for data directory names and `ceph --cluster`
    pub cluster: String,

    /// Node name to report instead of the host name
    pub node_name: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            osd_root: PathBuf::from("/var/lib/ceph/osd"),
            cluster: "ceph".to_string(),
            node_name: None,
        }
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Per-node collection run
pub struct Collector<H: NodeHost> {
    host: H,
    config: CollectorConfig,
    resolver: DeviceResolver,
    ceph: CephCli,
}

impl<H: NodeHost> Collector<H> {
    /// Create a collector with the standard resolution chain
    pub fn new(host: H, config: CollectorConfig) -> Self {
        let ceph = CephCli::new(config.cluster.clone());
        Self {
            host,
            config,
            resolver: DeviceResolver::standard(),
            ceph,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Collect everything about this node.
    ///
    /// Fails only when a required tool is missing; every other problem
    /// degrades to sentinel values in the report.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<NodeReport> {
        let caps = Capabilities::detect(&self.host).await?;

        let node = match &self.config.node_name {
            Some(name) => name.clone(),
            None => self.host.hostname().await,
        };
        info!(node = %node, "Collecting Ceph cluster information");

        let blocks = collect_blocks(&self.host, &self.ceph).await;
        let local = local_units(&self.host, &self.ceph, &self.config.osd_root, &node).await;
        info!("This server hosts {} OSD(s): {}", local.len(), local.join(", "));

        let mut units = Vec::with_capacity(local.len());
        for (index, unit_id) in local.iter().enumerate() {
            info!("Processing OSD {} ({}/{})", unit_id, index + 1, local.len());
            units.push(self.collect_unit(unit_id, caps).await);
        }

        let pools = pool_usage(&self.host, &self.ceph, caps).await;

        let report = NodeReport {
            node,
            generated_at: Utc::now(),
            blocks,
            local_units: local,
            units,
            pools,
        };

        let unresolved = report.unresolved_count();
        if unresolved > 0 {
            warn!(unresolved, "Some OSDs could not be mapped to a device");
        }

        Ok(report)
    }

    /// Resolve one OSD into a record. Never fails.
    pub async fn collect_unit(&self, unit_id: &str, caps: Capabilities) -> StorageUnitRecord {
        let metadata = match self.ceph.capture(&self.host, &["osd", "metadata", unit_id]).await {
            Some(text) => OsdMetadata::parse(&text),
            None => OsdMetadata::default(),
        };

        let ctx = UnitContext {
            host: &self.host,
            unit_id,
            data_dir: data_dir(&self.config.osd_root, &self.config.cluster, unit_id),
            caps,
            metadata: &metadata,
        };

        let mut record = StorageUnitRecord::unknown(unit_id);

        match self.resolver.resolve(&ctx).await {
            Some(hit) => {
                if let Some(volume) = hit.block_volume {
                    record.block_volume = volume;
                }
                if self.host.exists(Path::new(&hit.device)).await {
                    record.device_class = classify(&self.host, &hit.device).await;
                    let (size, model) = size_and_model(&self.host, &hit.device).await;
                    record.size = size;
                    record.model = model;
                } else {
                    warn!(unit = unit_id, device = %hit.device, "Device not present on disk");
                }
                record.block_device_path = hit.device;
            }
            None => {
                warn!(unit = unit_id, "Could not determine backing device");
                record.block_device_path = NOT_AVAILABLE.to_string();
            }
        }

        let db = resolve_companion(&ctx, CompanionKind::Db).await;
        let wal = resolve_companion(&ctx, CompanionKind::Wal).await;
        record.metadata_device_path = db.path;
        record.metadata_device_size = db.size;
        record.log_device_path = wal.path;
        record.log_device_size = wal.size;

        info!(
            unit = unit_id,
            device = %record.block_device_path,
            class = %record.device_class,
            db = %record.metadata_device_path,
            "OSD resolved"
        );

        record.normalized()
    }

    /// Run and write the report to `output`.
    ///
    /// The file is only touched once the whole report has been rendered.
    pub async fn collect_to_file(&self, output: &Path) -> Result<NodeReport> {
        let report = self.run().await?;
        write_report(&report, output).await?;
        info!(path = %output.display(), "Report written");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockHost;
    use crate::domain::record::{DeviceClass, COLOCATED, NOT_APPLICABLE, UNKNOWN};
    use crate::error::Error;
    use assert_matches::assert_matches;

    fn node() -> MockHost {
        MockHost::with_required_tools("storage-01")
            .with_tool("jq")
            .with_dir("/var/lib/ceph/osd", &["ceph-0", "ceph-3"])
            // osd.0: HDD with a DB partition on /dev/sdb1
            .with_command(
                "ceph-volume lvm list 0 --format json",
                r#"{"0": [{"devices": ["/dev/sda"], "lv_path": "/dev/ceph-a/osd-block-0", "type": "block"}]}"#,
            )
            .with_command(
                "ceph osd metadata 0",
                r#"{"bluefs_dedicated_db": "1", "bluefs_db_partition_path": "/dev/sdb1", "bluefs_dedicated_wal": "0"}"#,
            )
            .with_device("/dev/sda")
            .with_file("/sys/block/sda/queue/rotational", "1\n")
            .with_command("lsblk -d -n -P -o SIZE,MODEL /dev/sda", r#"SIZE="3.6T" MODEL="ST4000NM0035""#)
            .with_command("lsblk -d -n -o SIZE /dev/sdb1", "30G\n")
            // osd.3: SSD, nothing dedicated
            .with_command(
                "ceph-volume lvm list 3 --format json",
                r#"{"3": [{"devices": ["/dev/nvme0n1"], "type": "block"}]}"#,
            )
            .with_device("/dev/nvme0n1")
            .with_file("/sys/block/nvme0n1/queue/rotational", "0\n")
    }

    #[tokio::test]
    async fn test_run_builds_one_record_per_local_osd() {
        let collector = Collector::new(node(), CollectorConfig::default());
        let report = collector.run().await.unwrap();

        assert_eq!(report.node, "storage-01");
        assert_eq!(report.local_units, vec!["0", "3"]);
        assert_eq!(report.units.len(), 2);

        let osd0 = report.unit("0").unwrap();
        assert_eq!(osd0.device_class, DeviceClass::Hdd);
        assert_eq!(osd0.block_device_path, "/dev/sda");
        assert_eq!(osd0.block_volume, "/dev/ceph-a/osd-block-0");
        assert_eq!(osd0.metadata_device_path, "/dev/sdb1");
        assert_eq!(osd0.metadata_device_size, "30G");
        assert_eq!(osd0.size, "3.6T");

        let osd3 = report.unit("3").unwrap();
        assert_eq!(osd3.device_class, DeviceClass::Ssd);
        assert_eq!(osd3.metadata_device_path, COLOCATED);
        assert_eq!(osd3.metadata_device_size, NOT_APPLICABLE);
        assert_eq!(osd3.model, UNKNOWN);
    }

    #[tokio::test]
    async fn test_unresolvable_osd_still_gets_a_row() {
        let host = MockHost::with_required_tools("storage-02").with_dir("/var/lib/ceph/osd", &["ceph-7"]);
        let report = Collector::new(host, CollectorConfig::default()).run().await.unwrap();

        assert_eq!(report.units.len(), 1);
        assert!(report.units[0].is_unresolved());
        assert_eq!(report.units[0].device_class, DeviceClass::Unknown);
    }

    #[tokio::test]
    async fn test_missing_device_keeps_path_but_not_class() {
        let host = MockHost::with_required_tools("storage-02")
            .with_dir("/var/lib/ceph/osd", &["ceph-1"])
            .with_command("ceph osd metadata 1", r#"{"devices": "sdk"}"#)
            .with_file("/sys/block/sdk/queue/rotational", "1\n");
        let report = Collector::new(host, CollectorConfig::default()).run().await.unwrap();

        assert_eq!(report.units[0].block_device_path, "/dev/sdk");
        assert_eq!(report.units[0].device_class, DeviceClass::Unknown);
    }

    #[tokio::test]
    async fn test_node_name_override() {
        let config = CollectorConfig {
            node_name: Some("rack1-node".to_string()),
            ..Default::default()
        };
        let report = Collector::new(node(), config).run().await.unwrap();
        assert_eq!(report.node, "rack1-node");
    }

    #[tokio::test]
    async fn test_missing_tool_aborts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ceph-mapping.md");
        let collector = Collector::new(node().without_tool("lsblk"), CollectorConfig::default());

        assert_matches!(
            collector.collect_to_file(&output).await,
            Err(Error::MissingTool { tool, .. }) if tool == "lsblk"
        );
        assert!(!output.exists());
        assert_eq!(collector.host().invocations().len(), 0);
    }
}
