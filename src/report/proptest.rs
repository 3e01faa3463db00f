//! Property-Based Tests for Report Rendering and Parsing
//!
//! # Test Properties
//!
//! 1. **Roundtrip**: render(report) → parse = report, records field for
//!    field and in order
//! 2. **Idempotence**: parsing the same text twice gives the same result
//! 3. **Row Parity**: every listed local OSD has exactly one record after
//!    parsing, whichever rows were written

#![cfg(test)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use super::parser::parse_report;
use super::writer::render_report;
use crate::domain::record::{DeviceClass, StorageUnitRecord};
use crate::domain::report::{ClusterBlocks, NodeReport, PoolUsage};

// =============================================================================
// Property Strategies
// =============================================================================

/// Cell text: no surrounding whitespace, may contain pipes and backslashes
fn cell_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9/|\\\\._]([A-Za-z0-9/|\\\\ ._:()-]{0,16}[A-Za-z0-9/|\\\\._-])?"
}

fn class_strategy() -> impl Strategy<Value = DeviceClass> {
    prop_oneof![
        Just(DeviceClass::Hdd),
        Just(DeviceClass::Ssd),
        Just(DeviceClass::Unknown),
    ]
}

fn record_strategy() -> impl Strategy<Value = StorageUnitRecord> {
    (
        (cell_strategy(), cell_strategy(), cell_strategy(), class_strategy()),
        (cell_strategy(), cell_strategy(), cell_strategy(), cell_strategy()),
        (cell_strategy(), cell_strategy()),
    )
        .prop_map(
            |((unit_id, block_volume, block_device_path, device_class), (size, model, db, db_size), (wal, wal_size))| {
                StorageUnitRecord {
                    unit_id,
                    block_volume,
                    block_device_path,
                    device_class,
                    size,
                    model,
                    metadata_device_path: db,
                    metadata_device_size: db_size,
                    log_device_path: wal,
                    log_device_size: wal_size,
                }
            },
        )
}

/// Records with unique ids
fn records_strategy() -> impl Strategy<Value = Vec<StorageUnitRecord>> {
    prop::collection::vec(record_strategy(), 0..12).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.unit_id = format!("{}-{}", i, r.unit_id);
                r
            })
            .collect()
    })
}

fn pool_strategy() -> impl Strategy<Value = PoolUsage> {
    (cell_strategy(), cell_strategy(), cell_strategy(), cell_strategy(), cell_strategy()).prop_map(
        |(name, size, used, available, percent_used)| PoolUsage {
            name,
            size,
            used,
            available,
            percent_used,
        },
    )
}

fn report_with(units: Vec<StorageUnitRecord>, local_units: Vec<String>, pools: Vec<PoolUsage>) -> NodeReport {
    NodeReport {
        node: "prop-node".to_string(),
        generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        blocks: ClusterBlocks::default(),
        local_units,
        units,
        pools,
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_roundtrip_preserves_records(
        units in records_strategy(),
        pools in prop::collection::vec(pool_strategy(), 0..4),
    ) {
        let local: Vec<String> = units.iter().map(|u| u.unit_id.clone()).collect();
        let report = report_with(units, local, pools);

        let parsed = parse_report(&render_report(&report), "other");

        prop_assert_eq!(parsed, report);
    }

    #[test]
    fn prop_parsing_is_idempotent(units in records_strategy()) {
        let local: Vec<String> = units.iter().map(|u| u.unit_id.clone()).collect();
        let text = render_report(&report_with(units, local, vec![]));

        prop_assert_eq!(parse_report(&text, "n"), parse_report(&text, "n"));
    }

    #[test]
    fn prop_row_count_matches_local_list(
        units in records_strategy(),
        keep in prop::collection::vec(any::<bool>(), 12),
    ) {
        let local: Vec<String> = units.iter().map(|u| u.unit_id.clone()).collect();
        let written: Vec<StorageUnitRecord> = units
            .into_iter()
            .zip(keep.iter())
            .filter(|(_, keep)| **keep)
            .map(|(u, _)| u)
            .collect();

        let parsed = parse_report(&render_report(&report_with(written, local.clone(), vec![])), "n");

        prop_assert_eq!(parsed.units.len(), local.len());
        for id in &local {
            prop_assert_eq!(parsed.units.iter().filter(|u| &u.unit_id == id).count(), 1);
        }
    }
}
