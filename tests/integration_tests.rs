//! cephscope Integration Tests
//!
//! End-to-end runs of the pipeline against an in-memory node:
//! - Collection to a report file
//! - Report parsing and discovery
//! - Dashboard grouping, filtering and routes

use std::path::Path;

use hyper::Method;
use hyper::StatusCode;

use cephscope::adapters::MockHost;
use cephscope::collector::{Collector, CollectorConfig};
use cephscope::config::report_file_name;
use cephscope::dashboard::{route, DashboardState, GroupedView};
use cephscope::domain::record::{COLOCATED, NOT_APPLICABLE, NOT_AVAILABLE};
use cephscope::domain::DeviceClass;
use cephscope::error::Error;
use cephscope::report::parser::load_reports;
use cephscope::report::{parse_report, parse_report_file, render_report};

const OSD_TREE: &str = "\
ID  CLASS  WEIGHT   TYPE NAME            STATUS  REWEIGHT  PRI-AFF
-1         7.27739  root default
-3         7.27739      host storage-01
 0    hdd  3.63869          osd.0            up   1.00000  1.00000
 3    ssd  0.93149          osd.3            up   1.00000  1.00000
 5    hdd  3.63869          osd.5          down         0  1.00000
";

const DF_JSON: &str = r#"{
  "pools": [
    {"name": "rbd", "id": 1, "stats": {"stored": 1073741824, "bytes_used": 3221225472, "max_avail": 107374182400, "percent_used": 0.0123}},
    {"name": ".mgr", "id": 2, "stats": {"bytes_used": 0, "max_avail": 107374182400, "percent_used": 0.0}}
  ]
}"#;

/// Three OSDs: HDD with a DB partition, colocated SSD, and one nothing
/// can resolve.
fn storage_node() -> MockHost {
    MockHost::with_required_tools("storage-01")
        .with_tool("jq")
        .with_dir("/var/lib/ceph/osd", &["ceph-0", "ceph-3", "ceph-5", "lost+found"])
        .with_command("ceph status", "  cluster:\n    health: HEALTH_OK\n")
        .with_command("ceph osd tree", OSD_TREE)
        .with_command("ceph df --format json", DF_JSON)
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
        .with_command(
            "ceph-volume lvm list 3 --format json",
            r#"{"3": [{"devices": ["/dev/nvme0n1"], "type": "block"}]}"#,
        )
        .with_device("/dev/nvme0n1")
        .with_file("/sys/block/nvme0n1/queue/rotational", "0\n")
        .with_command(
            "lsblk -d -n -P -o SIZE,MODEL /dev/nvme0n1",
            r#"SIZE="931.5G" MODEL="Samsung SSD 980 PRO""#,
        )
}

async fn collect_into(dir: &Path, host: MockHost) -> std::path::PathBuf {
    let path = dir.join(report_file_name(&host_name(&host).await));
    Collector::new(host, CollectorConfig::default())
        .collect_to_file(&path)
        .await
        .unwrap();
    path
}

async fn host_name(host: &MockHost) -> String {
    use cephscope::domain::NodeHost;
    host.hostname().await
}

// =============================================================================
// Collection → Report
// =============================================================================

mod collection_tests {
    use super::*;

    #[tokio::test]
    async fn test_hdd_with_dedicated_db_survives_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = collect_into(dir.path(), storage_node()).await;

        let parsed = parse_report_file(&path).await.unwrap();
        let osd0 = parsed.report.unit("0").unwrap();

        assert_eq!(parsed.node(), "storage-01");
        assert_eq!(osd0.device_class, DeviceClass::Hdd);
        assert_eq!(osd0.block_device_path, "/dev/sda");
        assert_eq!(osd0.block_volume, "/dev/ceph-a/osd-block-0");
        assert_eq!(osd0.metadata_device_path, "/dev/sdb1");
        assert_eq!(osd0.metadata_device_size, "30G");
        assert_eq!(osd0.model, "ST4000NM0035");
    }

    #[tokio::test]
    async fn test_colocated_ssd_uses_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = collect_into(dir.path(), storage_node()).await;

        let parsed = parse_report_file(&path).await.unwrap();
        let osd3 = parsed.report.unit("3").unwrap();

        assert_eq!(osd3.device_class, DeviceClass::Ssd);
        assert_eq!(osd3.metadata_device_path, COLOCATED);
        assert_eq!(osd3.metadata_device_size, NOT_APPLICABLE);
        assert_eq!(parsed.crush_classes.get("3").map(String::as_str), Some("ssd"));
    }

    #[tokio::test]
    async fn test_every_local_osd_has_exactly_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = collect_into(dir.path(), storage_node()).await;

        let parsed = parse_report_file(&path).await.unwrap();
        let report = &parsed.report;

        assert_eq!(report.local_units, vec!["0", "3", "5"]);
        let ids: Vec<_> = report.units.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "3", "5"]);

        let osd5 = report.unit("5").unwrap();
        assert_eq!(osd5.block_device_path, NOT_AVAILABLE);
        assert_eq!(osd5.device_class, DeviceClass::Unknown);
        assert_eq!(report.unresolved_count(), 1);
    }

    #[tokio::test]
    async fn test_pools_and_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = collect_into(dir.path(), storage_node()).await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("HEALTH_OK"));
        assert!(text.contains("This server hosts the following OSDs: 0, 3, 5"));

        let parsed = parse_report_file(&path).await.unwrap();
        let pools: Vec<_> = parsed.report.pools.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(pools, vec!["rbd", ".mgr"]);
        assert_eq!(parsed.report.pools[0].percent_used, "1.23");
        assert_eq!(parsed.report.blocks.pg_status, "Not available");
    }

    #[tokio::test]
    async fn test_missing_required_tool_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceph-mapping.md");
        let collector = Collector::new(
            storage_node().without_tool("ceph-volume"),
            CollectorConfig::default(),
        );

        let err = collector.collect_to_file(&path).await.unwrap_err();
        assert!(matches!(err, Error::MissingTool { ref tool, .. } if tool == "ceph-volume"));
        assert!(err.to_string().contains("Install"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rerun_replaces_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let first = collect_into(dir.path(), storage_node()).await;
        let second = collect_into(dir.path(), storage_node()).await;
        assert_eq!(first, second);

        let text = tokio::fs::read_to_string(&second).await.unwrap();
        assert_eq!(text.matches("### Detailed Disk Information").count(), 1);
    }
}

// =============================================================================
// Report Parsing
// =============================================================================

mod parsing_tests {
    use super::*;

    #[test]
    fn test_header_without_rows_is_empty() {
        let text = "\
Node: empty-node

### Detailed Disk Information

| OSD ID | Block Device | Device Path | Type | Size | Model | DB Device | DB Size | WAL Device |
|---|---|---|---|---|---|---|---|---|
";
        let report = parse_report(text, "fallback");
        assert_eq!(report.node, "empty-node");
        assert!(report.units.is_empty());
        assert!(report.pools.is_empty());
    }

    #[tokio::test]
    async fn test_parsing_twice_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = collect_into(dir.path(), storage_node()).await;

        let first = parse_report_file(&path).await.unwrap();
        let second = parse_report_file(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            GroupedView::build(std::slice::from_ref(&first), None),
            GroupedView::build(std::slice::from_ref(&second), None)
        );
    }

    #[tokio::test]
    async fn test_rendering_the_parsed_report_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = collect_into(dir.path(), storage_node()).await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed = parse_report(&text, "x");
        assert_eq!(render_report(&parsed), text);
    }

    #[tokio::test]
    async fn test_discovery_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        collect_into(dir.path(), storage_node()).await;
        collect_into(dir.path(), MockHost::with_required_tools("storage-02")).await;
        std::fs::write(dir.path().join("notes.md"), "not a report").unwrap();

        let reports = load_reports(dir.path()).await;
        let nodes: Vec<_> = reports.iter().map(|r| r.node()).collect();
        assert_eq!(nodes, vec!["storage-01", "storage-02"]);
        assert!(reports[1].report.units.is_empty());
    }
}

// =============================================================================
// Dashboard
// =============================================================================

mod dashboard_tests {
    use super::*;

    #[tokio::test]
    async fn test_grouping_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        collect_into(dir.path(), storage_node()).await;

        let reports = load_reports(dir.path()).await;
        let view = GroupedView::build(&reports, None);

        assert_eq!(view.total_units(), reports[0].report.units.len());
        assert_eq!(view.class_count(DeviceClass::Ssd), 1);
        assert_eq!(view.class_count(DeviceClass::Hdd), 1);
        assert_eq!(view.class_count(DeviceClass::Unknown), 1);
    }

    #[tokio::test]
    async fn test_node_without_osds_stays_in_unfiltered_view() {
        let dir = tempfile::tempdir().unwrap();
        collect_into(dir.path(), storage_node()).await;
        collect_into(dir.path(), MockHost::with_required_tools("storage-02")).await;

        let reports = load_reports(dir.path()).await;
        let view = GroupedView::build(&reports, None);

        let nodes: Vec<_> = view.nodes.iter().map(|n| n.node.as_str()).collect();
        assert_eq!(nodes, vec!["storage-01", "storage-02"]);
        assert_eq!(view.nodes[1].unit_count(), 0);
        assert_eq!(view.nodes[1].classes.len(), 3);

        let filtered = GroupedView::build(&reports, Some("ssd"));
        assert_eq!(filtered.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_ssd_filter_hides_other_rows() {
        let dir = tempfile::tempdir().unwrap();
        collect_into(dir.path(), storage_node()).await;

        let reports = load_reports(dir.path()).await;
        let view = GroupedView::build(&reports, Some("ssd"));

        assert_eq!(view.total_units(), 1);
        let node = &view.nodes[0];
        assert_eq!(node.classes.len(), 1);
        assert_eq!(node.classes[0].class, DeviceClass::Ssd);
        assert_eq!(node.classes[0].units[0].record.unit_id, "3");
    }

    #[tokio::test]
    async fn test_routes_over_collected_reports() {
        let dir = tempfile::tempdir().unwrap();
        collect_into(dir.path(), storage_node()).await;

        let state = DashboardState::load(dir.path()).await.unwrap();

        let response = route(&state, &Method::GET, "/api/server/storage-01", None);
        assert_eq!(response.status(), StatusCode::OK);

        let response = route(&state, &Method::GET, "/api/server/storage-09", None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = route(&state, &Method::GET, "/osds-by-server", Some("filter=nvme"));
        assert_eq!(response.status(), StatusCode::OK);
    }
}
