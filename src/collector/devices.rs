//! Block Device Inspection
//!
//! Classification, size and model lookups for a device path, plus the
//! mapped-volume → physical-device resolution shared by the unit resolver
//! and the DB/WAL resolution.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::ports::{NodeHost, NodeHostExt};
use crate::domain::record::{DeviceClass, UNKNOWN};

static PARTITIONED_P_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:nvme\d+n\d+)|(?:mmcblk\d+)|(?:loop\d+)|(?:nbd\d+))p\d+$").unwrap());

static PARTITIONED_DIGIT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:sd|vd|xvd|hd)[a-z]+)\d+$").unwrap());

static LSBLK_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([A-Z:-]+)="([^"]*)""#).unwrap());

static HUMAN_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([\d.]+)\s*([KMGTPE]?)(?:I?B)?$").unwrap());

const UNITS: [&str; 7] = ["B", "K", "M", "G", "T", "P", "E"];

// =============================================================================
// Names
// =============================================================================

/// Kernel name of the whole disk behind a device path.
///
/// `/dev/sda1` → `sda`, `/dev/nvme0n1p2` → `nvme0n1`, `/dev/dm-3` → `dm-3`.
pub fn base_device_name(device: &str) -> String {
    let name = device.trim().trim_start_matches("/dev/");
    let name = name.rsplit('/').next().unwrap_or(name);

    if let Some(caps) = PARTITIONED_P_SUFFIX.captures(name) {
        return caps[1].to_string();
    }
    if let Some(caps) = PARTITIONED_DIGIT_SUFFIX.captures(name) {
        return caps[1].to_string();
    }
    name.to_string()
}

/// True for device-mapper nodes and `/dev/<vg>/<lv>` logical volume paths
pub fn is_mapped_volume(device: &str) -> bool {
    let Some(rest) = device.strip_prefix("/dev/") else {
        return false;
    };
    if rest.starts_with("mapper/") || rest.starts_with("dm-") {
        return true;
    }
    match rest.split_once('/') {
        Some((dir, lv)) => !lv.is_empty() && !matches!(dir, "disk" | "block" | "char" | "bus"),
        None => false,
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve a mapped or logical volume to the physical device underneath.
///
/// Tries `lvs -o devices`, then lsblk's parent kernel name. Paths that are
/// not mapped volumes, and volumes neither tool can resolve, come back
/// unchanged.
pub async fn physical_device<H: NodeHost + ?Sized>(host: &H, device: &str) -> String {
    if !is_mapped_volume(device) {
        return device.to_string();
    }

    if let Some(out) = host.capture("lvs", &["--noheadings", "-o", "devices", device]).await {
        if let Some(pv) = first_lvs_device(&out) {
            debug!(volume = device, physical = %pv, "Resolved volume through lvs");
            return pv;
        }
    }

    if let Some(out) = host.capture("lsblk", &["-n", "-o", "PKNAME", device]).await {
        if let Some(parent) = out.lines().map(str::trim).find(|l| !l.is_empty()) {
            debug!(volume = device, parent, "Resolved volume through lsblk");
            return format!("/dev/{}", parent);
        }
    }

    device.to_string()
}

/// First device of `lvs -o devices` output (`/dev/sdb(0),/dev/sdc(0)`)
fn first_lvs_device(output: &str) -> Option<String> {
    output
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|token| token.split('(').next().unwrap_or(token).trim())
        .find(|token| token.starts_with("/dev/"))
        .map(str::to_string)
}

/// Classify a device by its rotational flag.
///
/// Reads sysfs first, then matches `lsblk -d -o NAME,ROTA` rows by base
/// device name.
pub async fn classify<H: NodeHost + ?Sized>(host: &H, device: &str) -> DeviceClass {
    let base = base_device_name(device);
    let sysfs = format!("/sys/block/{}/queue/rotational", base);

    if let Some(flag) = host.read_trimmed(Path::new(&sysfs)).await {
        return DeviceClass::from_rotational(Some(&flag));
    }

    if let Some(out) = host.capture("lsblk", &["-d", "-n", "-o", "NAME,ROTA"]).await {
        for line in out.lines() {
            let mut cols = line.split_whitespace();
            if let (Some(name), Some(rota)) = (cols.next(), cols.next()) {
                if name == base {
                    return DeviceClass::from_rotational(Some(rota));
                }
            }
        }
    }

    DeviceClass::from_rotational(None)
}

/// Size and model of a device, `Unknown` for whatever cannot be read
pub async fn size_and_model<H: NodeHost + ?Sized>(host: &H, device: &str) -> (String, String) {
    let mut size = UNKNOWN.to_string();
    let mut model = UNKNOWN.to_string();

    if let Some(out) = host
        .capture("lsblk", &["-d", "-n", "-P", "-o", "SIZE,MODEL", device])
        .await
    {
        let pairs = parse_lsblk_pairs(&out);
        if let Some(s) = pairs.get("SIZE").filter(|s| !s.is_empty()) {
            size = s.clone();
        }
        if let Some(m) = pairs.get("MODEL").filter(|m| !m.is_empty()) {
            model = m.clone();
        }
    }

    if model == UNKNOWN {
        let path = format!("/sys/block/{}/device/model", base_device_name(device));
        if let Some(m) = host.read_trimmed(Path::new(&path)).await {
            model = m;
        }
    }

    (size, model)
}

/// Size of a device from `lsblk -d -n -o SIZE`
pub async fn device_size<H: NodeHost + ?Sized>(host: &H, device: &str) -> Option<String> {
    host.capture("lsblk", &["-d", "-n", "-o", "SIZE", device])
        .await
        .and_then(|out| out.lines().next().map(|l| l.trim().to_string()))
        .filter(|s| !s.is_empty())
}

/// Parse the first row of `lsblk -P` output into key → value
pub fn parse_lsblk_pairs(output: &str) -> HashMap<String, String> {
    let line = output.lines().next().unwrap_or("");
    LSBLK_PAIR
        .captures_iter(line)
        .map(|c| (c[1].to_string(), c[2].trim().to_string()))
        .collect()
}

// =============================================================================
// Sizes
// =============================================================================

/// Render bytes the way lsblk does (`931.5G`, `100G`, `512B`)
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        return format!("{}B", bytes);
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}{}", rounded as u64, UNITS[unit])
    } else {
        format!("{:.1}{}", rounded, UNITS[unit])
    }
}

/// Parse human sizes (`28 GiB`, `1.8T`, `0 B`, `512`) into bytes
pub fn parse_size_to_bytes(text: &str) -> Option<u64> {
    let caps = HUMAN_SIZE.captures(text.trim())?;
    let value: f64 = caps[1].parse().ok()?;
    let exponent = match caps[2].to_ascii_uppercase().as_str() {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        "E" => 6,
        _ => return None,
    };
    Some((value * 1024f64.powi(exponent)).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockHost;

    #[test]
    fn test_base_device_name_strips_partitions() {
        assert_eq!(base_device_name("/dev/sda1"), "sda");
        assert_eq!(base_device_name("/dev/sdab12"), "sdab");
        assert_eq!(base_device_name("/dev/nvme0n1p2"), "nvme0n1");
        assert_eq!(base_device_name("/dev/nvme0n1"), "nvme0n1");
        assert_eq!(base_device_name("/dev/mmcblk0p1"), "mmcblk0");
        assert_eq!(base_device_name("/dev/dm-3"), "dm-3");
        assert_eq!(base_device_name("sdc"), "sdc");
    }

    #[test]
    fn test_is_mapped_volume() {
        assert!(is_mapped_volume("/dev/mapper/ceph--a-osd--block--b"));
        assert!(is_mapped_volume("/dev/dm-0"));
        assert!(is_mapped_volume("/dev/ceph-3f2a/osd-block-8a1c"));
        assert!(!is_mapped_volume("/dev/sdb"));
        assert!(!is_mapped_volume("/dev/disk/by-id/wwn-0x5000"));
        assert!(!is_mapped_volume("tmpfs"));
    }

    #[test]
    fn test_first_lvs_device() {
        assert_eq!(first_lvs_device("  /dev/sdb(0)\n"), Some("/dev/sdb".to_string()));
        assert_eq!(
            first_lvs_device("  /dev/nvme0n1p3(1024),/dev/sdc(0)"),
            Some("/dev/nvme0n1p3".to_string())
        );
        assert_eq!(first_lvs_device("   "), None);
    }

    #[tokio::test]
    async fn test_physical_device_prefers_lvs() {
        let host = MockHost::with_required_tools("n")
            .with_command("lvs --noheadings -o devices /dev/ceph-a/osd-block-b", "  /dev/sdd(0)")
            .with_command("lsblk -n -o PKNAME /dev/dm-1", "sde\n");

        assert_eq!(physical_device(&host, "/dev/ceph-a/osd-block-b").await, "/dev/sdd");
        assert_eq!(physical_device(&host, "/dev/dm-1").await, "/dev/sde");
        assert_eq!(physical_device(&host, "/dev/dm-9").await, "/dev/dm-9");
        assert_eq!(physical_device(&host, "/dev/sdb1").await, "/dev/sdb1");
        assert!(!host.was_invoked("lvs --noheadings -o devices /dev/sdb1"));
    }

    #[tokio::test]
    async fn test_classify_sysfs_then_lsblk() {
        let host = MockHost::with_required_tools("n")
            .with_file("/sys/block/sda/queue/rotational", "1\n")
            .with_command("lsblk -d -n -o NAME,ROTA", "sda    1\nnvme0n1    0\n");

        assert_eq!(classify(&host, "/dev/sda2").await, DeviceClass::Hdd);
        assert_eq!(classify(&host, "/dev/nvme0n1p1").await, DeviceClass::Ssd);
        assert_eq!(classify(&host, "/dev/sdz").await, DeviceClass::Unknown);
    }

    #[tokio::test]
    async fn test_size_and_model_with_sysfs_model_fallback() {
        let host = MockHost::with_required_tools("n")
            .with_command(
                "lsblk -d -n -P -o SIZE,MODEL /dev/sdb",
                r#"SIZE="3.6T" MODEL="ST4000NM0035-1V4""#,
            )
            .with_command("lsblk -d -n -P -o SIZE,MODEL /dev/sdc", r#"SIZE="1.8T" MODEL="""#)
            .with_file("/sys/block/sdc/device/model", "HUS726020ALS21  \n");

        assert_eq!(
            size_and_model(&host, "/dev/sdb").await,
            ("3.6T".to_string(), "ST4000NM0035-1V4".to_string())
        );
        assert_eq!(
            size_and_model(&host, "/dev/sdc").await,
            ("1.8T".to_string(), "HUS726020ALS21".to_string())
        );
        assert_eq!(
            size_and_model(&host, "/dev/sdq").await,
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(107_374_182_400), "100G");
        assert_eq!(format_bytes(1_000_204_886_016), "931.5G");
        assert_eq!(format_bytes(4 * 1024u64.pow(4)), "4T");
    }

    #[test]
    fn test_parse_size_to_bytes() {
        assert_eq!(parse_size_to_bytes("0 B"), Some(0));
        assert_eq!(parse_size_to_bytes("28 GiB"), Some(28 * 1024u64.pow(3)));
        assert_eq!(parse_size_to_bytes("1.5T"), Some(1024u64.pow(4) * 3 / 2));
        assert_eq!(parse_size_to_bytes("512"), Some(512));
        assert_eq!(parse_size_to_bytes("lots"), None);
    }
}
