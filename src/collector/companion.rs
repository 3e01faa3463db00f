//! BlueStore DB/WAL Resolution
//!
//! The DB (metadata) and WAL (log) devices go through the same procedure:
//! an explicit "not dedicated" flag wins, then partition candidates from
//! metadata and from the `block.<kind>` link are tried in turn. Nothing
//! found means the device is colocated, which is a normal outcome.

use std::fmt;

use tracing::debug;

use super::devices::{device_size, format_bytes, is_mapped_volume, physical_device};
use super::resolver::UnitContext;
use crate::domain::ports::NodeHostExt;
use crate::domain::record::{COLOCATED, COLOCATED_WITH_METADATA, NOT_APPLICABLE};

/// Which BlueStore companion device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionKind {
    /// RocksDB metadata device
    Db,
    /// Write-ahead log device
    Wal,
}

impl CompanionKind {
    /// Key fragment used by `ceph osd metadata`
    pub fn key(&self) -> &'static str {
        match self {
            CompanionKind::Db => "db",
            CompanionKind::Wal => "wal",
        }
    }

    /// Link name inside the OSD data directory
    pub fn link_name(&self) -> &'static str {
        match self {
            CompanionKind::Db => "block.db",
            CompanionKind::Wal => "block.wal",
        }
    }

    /// Path sentinel when no dedicated device exists
    pub fn colocated(&self) -> &'static str {
        match self {
            CompanionKind::Db => COLOCATED,
            CompanionKind::Wal => COLOCATED_WITH_METADATA,
        }
    }
}

impl fmt::Display for CompanionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompanionKind::Db => "DB",
            CompanionKind::Wal => "WAL",
        })
    }
}

/// Resolved companion device, ready for the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion {
    pub path: String,
    pub size: String,
}

impl Companion {
    fn colocated(kind: CompanionKind) -> Self {
        Self {
            path: kind.colocated().to_string(),
            size: NOT_APPLICABLE.to_string(),
        }
    }
}

/// Resolve the DB or WAL device of one OSD
pub async fn resolve_companion(ctx: &UnitContext<'_>, kind: CompanionKind) -> Companion {
    if ctx.metadata.dedicated(kind.key()) == Some(false) {
        debug!(unit = ctx.unit_id, %kind, "Not dedicated per metadata");
        return Companion::colocated(kind);
    }

    let Some(candidate) = find_candidate(ctx, kind).await else {
        return Companion::colocated(kind);
    };

    let path = if is_mapped_volume(&candidate) {
        physical_device(ctx.host, &candidate).await
    } else {
        candidate.clone()
    };

    let size = match device_size(ctx.host, &candidate).await {
        Some(size) => size,
        None => match ctx.metadata.size_bytes(kind.key()) {
            Some(bytes) if ctx.caps.calculator => format_bytes(bytes),
            Some(bytes) => bytes.to_string(),
            None => NOT_APPLICABLE.to_string(),
        },
    };

    debug!(unit = ctx.unit_id, %kind, %path, %size, "Companion device resolved");
    Companion { path, size }
}

/// First usable partition candidate, with symlinks followed one level
async fn find_candidate(ctx: &UnitContext<'_>, kind: CompanionKind) -> Option<String> {
    if let Some(partition) = ctx.metadata.partition_path(kind.key()) {
        return Some(follow(ctx, &partition).await);
    }

    let link = ctx.data_dir.join(kind.link_name());
    ctx.host
        .follow_link(&link)
        .await
        .map(|target| target.to_string_lossy().into_owned())
}

async fn follow(ctx: &UnitContext<'_>, path: &str) -> String {
    match ctx.host.follow_link(std::path::Path::new(path)).await {
        Some(target) => target.to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockHost;
    use crate::collector::capabilities::Capabilities;
    use crate::collector::metadata::OsdMetadata;
    use crate::collector::resolver::data_dir;
    use std::path::Path;

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
    async fn test_partition_from_metadata() {
        let host = MockHost::with_required_tools("n")
            .with_command("lsblk -d -n -o SIZE /dev/sdb1", "30G\n");
        let meta = OsdMetadata::parse(r#"{"bluefs_dedicated_db": "1", "bluefs_db_partition_path": "/dev/sdb1"}"#);
        let ctx = context(&host, "0", Capabilities::full(), &meta);

        let db = resolve_companion(&ctx, CompanionKind::Db).await;
        assert_eq!(db.path, "/dev/sdb1");
        assert_eq!(db.size, "30G");
    }

    #[tokio::test]
    async fn test_no_candidates_means_colocated() {
        let host = MockHost::with_required_tools("n");
        let meta = OsdMetadata::default();
        let ctx = context(&host, "3", Capabilities::full(), &meta);

        let db = resolve_companion(&ctx, CompanionKind::Db).await;
        let wal = resolve_companion(&ctx, CompanionKind::Wal).await;
        assert_eq!(db, Companion { path: COLOCATED.to_string(), size: NOT_APPLICABLE.to_string() });
        assert_eq!(wal.path, COLOCATED_WITH_METADATA);
        assert_eq!(wal.size, NOT_APPLICABLE);
    }

    #[tokio::test]
    async fn test_dedicated_flag_zero_short_circuits() {
        let host = MockHost::with_required_tools("n")
            .with_link("/var/lib/ceph/osd/ceph-1/block.wal", "/dev/sdc2");
        let meta = OsdMetadata::parse(r#"{"bluefs_dedicated_wal": "0"}"#);
        let ctx = context(&host, "1", Capabilities::full(), &meta);

        assert_eq!(resolve_companion(&ctx, CompanionKind::Wal).await.path, COLOCATED_WITH_METADATA);
    }

    #[tokio::test]
    async fn test_link_to_logical_volume_resolves_physical_device() {
        let host = MockHost::with_required_tools("n")
            .with_link("/var/lib/ceph/osd/ceph-2/block.db", "/dev/ceph-db/db-2")
            .with_command("lvs --noheadings -o devices /dev/ceph-db/db-2", "  /dev/nvme0n1(2048)\n")
            .with_command("lsblk -d -n -o SIZE /dev/ceph-db/db-2", "60G\n");
        let meta = OsdMetadata::default();
        let ctx = context(&host, "2", Capabilities::full(), &meta);

        let db = resolve_companion(&ctx, CompanionKind::Db).await;
        assert_eq!(db.path, "/dev/nvme0n1");
        assert_eq!(db.size, "60G");
    }

    #[tokio::test]
    async fn test_size_falls_back_to_metadata_bytes() {
        let host = MockHost::with_required_tools("n");
        let meta = OsdMetadata::parse(
            r#"{"bluefs_wal_partition_path": "/dev/sdg3", "bluefs_wal_size": "1073741824"}"#,
        );

        let ctx = context(&host, "4", Capabilities::full(), &meta);
        assert_eq!(resolve_companion(&ctx, CompanionKind::Wal).await.size, "1G");

        let ctx = context(&host, "4", Capabilities::minimal(), &meta);
        assert_eq!(resolve_companion(&ctx, CompanionKind::Wal).await.size, "1073741824");
    }
}
