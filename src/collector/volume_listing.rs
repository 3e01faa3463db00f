//! `ceph-volume lvm list` Parsing
//!
//! Two parse paths over the same listing: structured JSON
//! (`--format json`) and line-oriented extraction of the plain text form:
//!
//! ```text
//! ====== osd.0 =======
//!
//!   [block]       /dev/ceph-3f2a/osd-block-8a1c
//!
//!       block device              /dev/ceph-3f2a/osd-block-8a1c
//!       osd id                    0
//!       type                      block
//!       devices                   /dev/sdb
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(block|db|wal)\]\s+(\S+)").unwrap());

static DEVICES_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*devices\s+(\S+)").unwrap());

static OSD_BANNER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^=+\s*osd\.(\d+)\s*=+").unwrap());

/// What the volume listing says about an OSD's block volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeListing {
    /// Logical volume holding the OSD's data
    pub block_volume: Option<String>,
    /// Physical device(s) under that volume, first one
    pub block_device: Option<String>,
}

impl VolumeListing {
    fn is_empty(&self) -> bool {
        self.block_volume.is_none() && self.block_device.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct LvEntry {
    #[serde(default)]
    devices: Vec<String>,
    #[serde(default)]
    lv_path: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Parse the JSON listing for `unit_id`.
///
/// `None` when the JSON is malformed, the OSD is absent, or it has no
/// block entry.
pub fn parse_json(unit_id: &str, text: &str) -> Option<VolumeListing> {
    let listing: HashMap<String, Vec<LvEntry>> = serde_json::from_str(text).ok()?;
    let entries = listing.get(unit_id)?;
    let block = entries.iter().find(|e| e.kind == "block")?;

    let result = VolumeListing {
        block_volume: block.lv_path.clone().or_else(|| block.path.clone()),
        block_device: block.devices.iter().find(|d| !d.is_empty()).cloned(),
    };
    (!result.is_empty()).then_some(result)
}

/// Parse the plain text listing for `unit_id`
pub fn parse_text(unit_id: &str, text: &str) -> Option<VolumeListing> {
    let mut result = VolumeListing::default();
    let mut current_osd: Option<String> = None;
    let mut in_block_section = false;

    for line in text.lines() {
        if let Some(caps) = OSD_BANNER.captures(line) {
            current_osd = Some(caps[1].to_string());
            in_block_section = false;
            continue;
        }
        if current_osd.as_deref().is_some_and(|id| id != unit_id) {
            continue;
        }
        if let Some(caps) = SECTION_HEADER.captures(line) {
            in_block_section = &caps[1] == "block";
            if in_block_section && result.block_volume.is_none() {
                result.block_volume = Some(caps[2].to_string());
            }
            continue;
        }
        if in_block_section && result.block_device.is_none() {
            if let Some(caps) = DEVICES_LINE.captures(line) {
                let first = caps[1].split(',').next().unwrap_or(&caps[1]);
                result.block_device = Some(first.to_string());
            }
        }
    }

    (!result.is_empty()).then_some(result)
}
