//! Storage Unit Records
//!
//! One [`StorageUnitRecord`] describes one OSD hosted on a node: the device
//! backing it, how that device is classified, and where its BlueStore DB
//! (metadata) and WAL (log) live.

use serde::{Deserialize, Serialize};

// =============================================================================
// Sentinels
// =============================================================================

/// Value used when a field could not be determined
pub const UNKNOWN: &str = "Unknown";

/// Value used for sizes of devices that do not exist separately
pub const NOT_APPLICABLE: &str = "N/A";

/// DB device shares the primary device
pub const COLOCATED: &str = "Colocated";

/// WAL device shares the DB device
pub const COLOCATED_WITH_METADATA: &str = "Colocated with metadata device";

/// Device path when every resolution source came back empty
pub const NOT_AVAILABLE: &str = "Information not available";

// =============================================================================
// Device Class
// =============================================================================

/// Classification of the device backing an OSD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Rotational device
    #[serde(rename = "HDD")]
    Hdd,
    /// Non-rotational device
    #[serde(rename = "SSD")]
    Ssd,
    /// Rotational flag unavailable
    Unknown,
}

impl DeviceClass {
    /// Classify from the content of a rotational flag (`1` → HDD, `0` → SSD).
    ///
    /// Anything else, including an absent flag, yields `Unknown`.
    pub fn from_rotational(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("1") => DeviceClass::Hdd,
            Some("0") => DeviceClass::Ssd,
            _ => DeviceClass::Unknown,
        }
    }

    /// Parse the rendered form back, case-insensitively
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "hdd" => DeviceClass::Hdd,
            "ssd" => DeviceClass::Ssd,
            _ => DeviceClass::Unknown,
        }
    }

    /// All classes in dashboard display order
    pub fn all() -> [DeviceClass; 3] {
        [DeviceClass::Ssd, DeviceClass::Hdd, DeviceClass::Unknown]
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceClass::Hdd => write!(f, "HDD"),
            DeviceClass::Ssd => write!(f, "SSD"),
            DeviceClass::Unknown => write!(f, "Unknown"),
        }
    }
}

// =============================================================================
// Storage Unit Record
// =============================================================================

/// Everything known about one OSD on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnitRecord {
    /// OSD id, unique within a node
    pub unit_id: String,
    /// Logical block volume (LV path or `block` link target)
    pub block_volume: String,
    /// Physical device backing the OSD
    pub block_device_path: String,
    /// Rotational classification of the backing device
    pub device_class: DeviceClass,
    /// Human-readable size as reported by lsblk
    pub size: String,
    /// Device model
    pub model: String,
    /// BlueStore DB device
    pub metadata_device_path: String,
    /// BlueStore DB size
    pub metadata_device_size: String,
    /// BlueStore WAL device
    pub log_device_path: String,
    /// BlueStore WAL size
    pub log_device_size: String,
}

impl StorageUnitRecord {
    /// A record with every field at its "nothing known" sentinel
    pub fn unknown(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            block_volume: NOT_APPLICABLE.to_string(),
            block_device_path: UNKNOWN.to_string(),
            device_class: DeviceClass::Unknown,
            size: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            metadata_device_path: COLOCATED.to_string(),
            metadata_device_size: NOT_APPLICABLE.to_string(),
            log_device_path: COLOCATED_WITH_METADATA.to_string(),
            log_device_size: NOT_APPLICABLE.to_string(),
        }
    }

    /// Replace empty fields with their sentinels.
    ///
    /// Every record passes through here before it is rendered so that no
    /// table cell is ever blank.
    pub fn normalized(mut self) -> Self {
        fn fill(field: &mut String, sentinel: &str) {
            if field.trim().is_empty() {
                *field = sentinel.to_string();
            }
        }

        fill(&mut self.block_volume, NOT_APPLICABLE);
        fill(&mut self.block_device_path, UNKNOWN);
        fill(&mut self.size, UNKNOWN);
        fill(&mut self.model, UNKNOWN);
        fill(&mut self.metadata_device_path, COLOCATED);
        fill(&mut self.metadata_device_size, NOT_APPLICABLE);
        fill(&mut self.log_device_path, COLOCATED_WITH_METADATA);
        fill(&mut self.log_device_size, NOT_APPLICABLE);
        self
    }

    /// True when no resolution source produced a device path
    pub fn is_unresolved(&self) -> bool {
        self.block_device_path == NOT_AVAILABLE
    }

    /// True when the DB lives on its own device
    pub fn has_dedicated_metadata(&self) -> bool {
        self.metadata_device_path != COLOCATED
    }

    /// All text fields, in table order, for display-side searching
    pub fn text_fields(&self) -> [&str; 9] {
        [
            &self.unit_id,
            &self.block_volume,
            &self.block_device_path,
            &self.size,
            &self.model,
            &self.metadata_device_path,
            &self.metadata_device_size,
            &self.log_device_path,
            &self.log_device_size,
        ]
    }

    /// Case-insensitive substring match on any field, including the class.
    ///
    /// `needle` must already be lower-cased.
    pub fn matches(&self, needle: &str) -> bool {
        self.device_class.to_string().to_lowercase().contains(needle)
            || self
                .text_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_class_from_rotational() {
        assert_eq!(DeviceClass::from_rotational(Some("1")), DeviceClass::Hdd);
        assert_eq!(DeviceClass::from_rotational(Some("0\n")), DeviceClass::Ssd);
        assert_eq!(DeviceClass::from_rotational(Some("")), DeviceClass::Unknown);
        assert_eq!(DeviceClass::from_rotational(None), DeviceClass::Unknown);
    }

    #[test]
    fn test_device_class_parse_roundtrips_display() {
        for class in DeviceClass::all() {
            assert_eq!(DeviceClass::parse(&class.to_string()), class);
        }
        assert_eq!(DeviceClass::parse(" ssd "), DeviceClass::Ssd);
        assert_eq!(DeviceClass::parse("nvme"), DeviceClass::Unknown);
    }

    #[test]
    fn test_normalized_fills_blank_fields() {
        let mut record = StorageUnitRecord::unknown("7");
        record.size = String::new();
        record.log_device_path = "  ".to_string();

        let record = record.normalized();
        assert_eq!(record.size, UNKNOWN);
        assert_eq!(record.log_device_path, COLOCATED_WITH_METADATA);
        assert!(!record.has_dedicated_metadata());
    }

    #[test]
    fn test_matches_is_case_insensitive_over_fields_and_class() {
        let mut record = StorageUnitRecord::unknown("12");
        record.model = "Samsung SSD 860".to_string();
        record.device_class = DeviceClass::Hdd;

        assert!(record.matches("samsung"));
        assert!(record.matches("hdd"));
        assert!(record.matches("colocated"));
        assert!(!record.matches("nvme"));
    }
}
