//! Backing Device Resolution
//!
//! An OSD's backing device is found by asking a fixed list of strategies
//! in order. Each one returns `None` when its source has nothing usable;
//! the first hit wins.
//!
//! ```text
//!   VolumeListing ──► MountSource ──► Metadata ──► (Information not available)
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::capabilities::Capabilities;
use super::devices::{is_mapped_volume, physical_device};
use super::metadata::OsdMetadata;
use super::volume_listing;
use crate::domain::ports::{NodeHost, NodeHostExt};

/// Everything a strategy may consult about one OSD
pub struct UnitContext<'a> {
    pub host: &'a dyn NodeHost,
    pub unit_id: &'a str,
    /// OSD data directory, e.g. `/var/lib/ceph/osd/ceph-0`
    pub data_dir: PathBuf,
    pub caps: Capabilities,
    pub metadata: &'a OsdMetadata,
}

/// Result of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHit {
    /// Physical device path
    pub device: String,
    /// Logical volume in front of the device, if any
    pub block_volume: Option<String>,
    /// Strategy that produced the hit
    pub source: &'static str,
}

/// One source of truth for an OSD's backing device
#[async_trait]
pub trait DeviceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, ctx: &UnitContext<'_>) -> Option<DeviceHit>;
}

// =============================================================================
// Volume Listing
// =============================================================================

/// `ceph-volume lvm list <id>`
pub struct VolumeListingStrategy;

#[async_trait]
impl DeviceStrategy for VolumeListingStrategy {
    fn name(&self) -> &'static str {
        "ceph-volume"
    }

    async fn resolve(&self, ctx: &UnitContext<'_>) -> Option<DeviceHit> {
        let listing = if ctx.caps.json_processor {
            let out = ctx
                .host
                .capture("ceph-volume", &["lvm", "list", ctx.unit_id, "--format", "json"])
                .await?;
            volume_listing::parse_json(ctx.unit_id, &out)?
        } else {
            let out = ctx
                .host
                .capture("ceph-volume", &["lvm", "list", ctx.unit_id])
                .await?;
            volume_listing::parse_text(ctx.unit_id, &out)?
        };

        let device = match (&listing.block_device, &listing.block_volume) {
            (Some(device), _) => physical_device(ctx.host, device).await,
            (None, Some(volume)) => physical_device(ctx.host, volume).await,
            (None, None) => return None,
        };

        Some(DeviceHit {
            device,
            block_volume: listing.block_volume,
            source: self.name(),
        })
    }
}

// =============================================================================
// Mount Source
// =============================================================================

/// `findmnt` on the data directory, following the `block` link for
/// tmpfs-backed BlueStore directories
pub struct MountSourceStrategy;

#[async_trait]
impl DeviceStrategy for MountSourceStrategy {
    fn name(&self) -> &'static str {
        "mount"
    }

    async fn resolve(&self, ctx: &UnitContext<'_>) -> Option<DeviceHit> {
        let data_dir = ctx.data_dir.to_string_lossy();
        let source = ctx
            .host
            .capture("findmnt", &["-n", "-o", "SOURCE", "--target", &data_dir])
            .await?;
        let source = source.lines().next().unwrap_or("").trim().to_string();

        let volume = if source.starts_with("/dev/") {
            source
        } else {
            debug!(unit = ctx.unit_id, %source, "Data dir is not a device mount, following block link");
            let target = ctx.host.follow_link(&ctx.data_dir.join("block")).await?;
            target.to_string_lossy().into_owned()
        };

        let device = physical_device(ctx.host, &volume).await;
        Some(DeviceHit {
            block_volume: is_mapped_volume(&volume).then_some(volume),
            device,
            source: self.name(),
        })
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// `ceph osd metadata <id>`
pub struct MetadataStrategy;

#[async_trait]
impl DeviceStrategy for MetadataStrategy {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn resolve(&self, ctx: &UnitContext<'_>) -> Option<DeviceHit> {
        let primary = ctx.metadata.primary_device()?;
        let block_volume = ctx
            .metadata
            .get("bluestore_bdev_dev_node")
            .filter(|node| is_mapped_volume(node))
            .map(str::to_string);

        Some(DeviceHit {
            device: physical_device(ctx.host, &primary).await,
            block_volume,
            source: self.name(),
        })
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Ordered strategy chain
pub struct DeviceResolver {
    strategies: Vec<Box<dyn DeviceStrategy>>,
}

impl DeviceResolver {
    /// Chain of custom strategies
    pub fn new(strategies: Vec<Box<dyn DeviceStrategy>>) -> Self {
        Self { strategies }
    }

    /// Volume listing, mount source, metadata
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(VolumeListingStrategy),
            Box::new(MountSourceStrategy),
            Box::new(MetadataStrategy),
        ])
    }

    /// Strategy names in trial order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Ask each strategy in turn
    pub async fn resolve(&self, ctx: &UnitContext<'_>) -> Option<DeviceHit> {
        for strategy in &self.strategies {
            if let Some(hit) = strategy.resolve(ctx).await {
                debug!(unit = ctx.unit_id, source = hit.source, device = %hit.device, "Backing device resolved");
                return Some(hit);
            }
            debug!(unit = ctx.unit_id, source = strategy.name(), "No device from source");
        }
        None
    }
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::standard()
    }
}

/// Data directory of an OSD: `<root>/<cluster>-<id>`
pub fn data_dir(osd_root: &Path, cluster: &str, unit_id: &str) -> PathBuf {
    osd_root.join(format!("{}-{}", cluster, unit_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockHost;

    fn context<'a>(host: &'a MockHost, unit: &'a str, caps: Capabilities, meta: &'a OsdMetadata) -> UnitContext<'a> {
        UnitContext {
            host,
            unit_id: unit,
            data_dir: data_dir(Path::new("/var/lib/ceph/osd"), "ceph", unit),
            caps,
            metadata: meta,
        }
    }

    #[tokio::test]
    async fn test_volume_listing_json_path() {
        let host = MockHost::with_required_tools("n").with_command(
            "ceph-volume lvm list 0 --format json",
            r#"{"0": [{"devices": ["/dev/sdb"], "lv_path": "/dev/ceph-a/osd-block-0", "type": "block"}]}"#,
        );
        let meta = OsdMetadata::default();

        let hit = DeviceResolver::standard()
            .resolve(&context(&host, "0", Capabilities::full(), &meta))
            .await
            .unwrap();

        assert_eq!(hit.device, "/dev/sdb");
        assert_eq!(hit.block_volume.as_deref(), Some("/dev/ceph-a/osd-block-0"));
        assert_eq!(hit.source, "ceph-volume");
        assert!(!host.was_invoked("ceph-volume lvm list 0"));
    }

    #[tokio::test]
    async fn test_volume_listing_text_path_without_json_processor() {
        let host = MockHost::with_required_tools("n").with_command(
            "ceph-volume lvm list 2",
            "====== osd.2 =======\n  [block]  /dev/ceph-b/osd-block-2\n      devices    /dev/sdd\n",
        );
        let meta = OsdMetadata::default();

        let hit = DeviceResolver::standard()
            .resolve(&context(&host, "2", Capabilities::minimal(), &meta))
            .await
            .unwrap();

        assert_eq!(hit.device, "/dev/sdd");
        assert!(!host.was_invoked("ceph-volume lvm list 2 --format json"));
    }

    #[tokio::test]
    async fn test_mount_source_follows_block_link_on_tmpfs() {
        let host = MockHost::with_required_tools("n")
            .with_tool("findmnt")
            .with_command("findmnt -n -o SOURCE --target /var/lib/ceph/osd/ceph-1", "tmpfs\n")
            .with_link("/var/lib/ceph/osd/ceph-1/block", "/dev/ceph-c/osd-block-1")
            .with_command("lvs --noheadings -o devices /dev/ceph-c/osd-block-1", "  /dev/sdc(0)\n");
        let meta = OsdMetadata::default();

        let hit = DeviceResolver::standard()
            .resolve(&context(&host, "1", Capabilities::full(), &meta))
            .await
            .unwrap();

        assert_eq!(hit.source, "mount");
        assert_eq!(hit.device, "/dev/sdc");
        assert_eq!(hit.block_volume.as_deref(), Some("/dev/ceph-c/osd-block-1"));
    }

    #[tokio::test]
    async fn test_mount_source_plain_device() {
        let host = MockHost::with_required_tools("n")
            .with_tool("findmnt")
            .with_command("findmnt -n -o SOURCE --target /var/lib/ceph/osd/ceph-4", "/dev/sdf1\n");
        let meta = OsdMetadata::default();

        let hit = MountSourceStrategy
            .resolve(&context(&host, "4", Capabilities::full(), &meta))
            .await
            .unwrap();

        assert_eq!(hit.device, "/dev/sdf1");
        assert_eq!(hit.block_volume, None);
    }

    #[tokio::test]
    async fn test_metadata_is_last_resort() {
        let host = MockHost::with_required_tools("n");
        let meta = OsdMetadata::parse(r#"{"devices": "sde"}"#);

        let hit = DeviceResolver::standard()
            .resolve(&context(&host, "5", Capabilities::full(), &meta))
            .await
            .unwrap();

        assert_eq!(hit.source, "metadata");
        assert_eq!(hit.device, "/dev/sde");
    }

    #[tokio::test]
    async fn test_all_sources_fail() {
        let host = MockHost::with_required_tools("n");
        let meta = OsdMetadata::default();

        let resolver = DeviceResolver::standard();
        assert_eq!(resolver.strategy_names(), vec!["ceph-volume", "mount", "metadata"]);
        assert!(resolver
            .resolve(&context(&host, "6", Capabilities::full(), &meta))
            .await
            .is_none());
    }
}
