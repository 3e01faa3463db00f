//! OSD Metadata
//!
//! Flat key/value view of `ceph osd metadata <id>`. Values are kept as
//! strings; numbers and booleans are stringified. When the JSON does not
//! parse, quoted `"key": "value"` pairs are scraped from the raw text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static QUOTED_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([A-Za-z0-9_]+)"\s*:\s*"?([^",}\n]*)"?"#).unwrap());

/// Parsed `ceph osd metadata` output for one OSD
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsdMetadata {
    fields: HashMap<String, String>,
}

impl OsdMetadata {
    /// Parse metadata output, never failing: unusable text gives an empty map
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Map<String, Value>>(text) {
            Ok(map) => Self {
                fields: map
                    .into_iter()
                    .map(|(key, value)| {
                        let value = match value {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (key, value)
                    })
                    .collect(),
            },
            Err(e) => {
                debug!(error = %e, "OSD metadata is not valid JSON, scanning raw text");
                Self {
                    fields: QUOTED_PAIR
                        .captures_iter(text)
                        .map(|c| (c[1].to_string(), c[2].trim().to_string()))
                        .collect(),
                }
            }
        }
    }

    /// Non-empty value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Primary data device.
    ///
    /// First of `devices` (comma-separated kernel names),
    /// `bluestore_bdev_dev_node`, `bluestore_bdev_partition_path`.
    pub fn primary_device(&self) -> Option<String> {
        if let Some(devices) = self.get("devices") {
            if let Some(first) = devices.split(',').map(str::trim).find(|d| !d.is_empty()) {
                return Some(as_device_path(first));
            }
        }
        self.get("bluestore_bdev_dev_node")
            .or_else(|| self.get("bluestore_bdev_partition_path"))
            .map(as_device_path)
    }

    /// `bluefs_dedicated_<kind>`: `Some(false)` means explicitly colocated
    pub fn dedicated(&self, kind: &str) -> Option<bool> {
        match self.get(&format!("bluefs_dedicated_{}", kind))? {
            "0" | "false" => Some(false),
            "1" | "true" => Some(true),
            _ => None,
        }
    }

    /// `bluefs_<kind>_partition_path`
    pub fn partition_path(&self, kind: &str) -> Option<String> {
        self.get(&format!("bluefs_{}_partition_path", kind))
            .map(as_device_path)
    }

    /// `bluefs_<kind>_size` in bytes, ignoring zero
    pub fn size_bytes(&self, kind: &str) -> Option<u64> {
        self.get(&format!("bluefs_{}_size", kind))?
            .parse::<u64>()
            .ok()
            .filter(|bytes| *bytes > 0)
    }
}

fn as_device_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/dev/{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{
        "id": 0,
        "bluefs": "1",
        "bluefs_dedicated_db": "1",
        "bluefs_dedicated_wal": "0",
        "bluefs_db_partition_path": "/dev/sdb1",
        "bluefs_db_size": "32212254720",
        "bluestore_bdev_dev_node": "/dev/dm-0",
        "devices": "sda,sdb",
        "rotational": "1"
    }"#;

    #[test]
    fn test_parse_json_fields() {
        let meta = OsdMetadata::parse(METADATA);
        assert_eq!(meta.get("id"), Some("0"));
        assert_eq!(meta.primary_device().as_deref(), Some("/dev/sda"));
        assert_eq!(meta.dedicated("db"), Some(true));
        assert_eq!(meta.dedicated("wal"), Some(false));
        assert_eq!(meta.partition_path("db").as_deref(), Some("/dev/sdb1"));
        assert_eq!(meta.partition_path("wal"), None);
        assert_eq!(meta.size_bytes("db"), Some(32_212_254_720));
        assert_eq!(meta.size_bytes("wal"), None);
    }

    #[test]
    fn test_primary_device_fallback_order() {
        let meta = OsdMetadata::parse(r#"{"devices": "", "bluestore_bdev_partition_path": "/dev/sdc"}"#);
        assert_eq!(meta.primary_device().as_deref(), Some("/dev/sdc"));

        let meta = OsdMetadata::parse(r#"{"bluestore_bdev_dev_node": "/dev/dm-4", "bluestore_bdev_partition_path": "/dev/sdc"}"#);
        assert_eq!(meta.primary_device().as_deref(), Some("/dev/dm-4"));
    }

    #[test]
    fn test_malformed_json_uses_regex_scan() {
        let truncated = r#"{
            "bluefs_dedicated_db": "1",
            "bluefs_db_partition_path": "/dev/nvme0n1p3",
            "devices": "sdd",
            "hostname": "#;
        let meta = OsdMetadata::parse(truncated);
        assert!(!meta.is_empty());
        assert_eq!(meta.primary_device().as_deref(), Some("/dev/sdd"));
        assert_eq!(meta.partition_path("db").as_deref(), Some("/dev/nvme0n1p3"));
    }

    #[test]
    fn test_garbage_is_empty() {
        let meta = OsdMetadata::parse("Error ENOENT: osd.9 does not exist");
        assert!(meta.is_empty());
        assert_eq!(meta.primary_device(), None);
    }
}
