//! Markdown Tables
//!
//! One renderer parameterised by a column list, and a tolerant parser
//! that maps cells by header name rather than position.
//!
//! Cell escaping: `\` → `\\`, `|` → `\|`, line breaks → spaces.

use crate::domain::record::{StorageUnitRecord, UNKNOWN};
use crate::domain::report::PoolUsage;

/// One table column: header, accepted alternative headers, and accessor
pub struct Column<T> {
    pub header: &'static str,
    pub aliases: &'static [&'static str],
    pub value: fn(&T) -> String,
}

impl<T> Column<T> {
    /// Case-insensitive match against the header or any alias
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.header.to_lowercase() == name || self.aliases.iter().any(|a| *a == name)
    }
}

// =============================================================================
// Column sets
// =============================================================================

pub const OSD_ID: Column<StorageUnitRecord> = Column {
    header: "OSD ID",
    aliases: &["osd", "id", "osd_id", "osd.id"],
    value: |r| r.unit_id.clone(),
};

pub const BLOCK_DEVICE: Column<StorageUnitRecord> = Column {
    header: "Block Device",
    aliases: &["block", "block volume", "lv", "logical volume"],
    value: |r| r.block_volume.clone(),
};

pub const DEVICE_PATH: Column<StorageUnitRecord> = Column {
    header: "Device Path",
    aliases: &["device", "path", "physical device", "disk"],
    value: |r| r.block_device_path.clone(),
};

pub const DEVICE_TYPE: Column<StorageUnitRecord> = Column {
    header: "Type",
    aliases: &["class", "device class", "device type", "media"],
    value: |r| r.device_class.to_string(),
};

pub const SIZE: Column<StorageUnitRecord> = Column {
    header: "Size",
    aliases: &["capacity"],
    value: |r| r.size.clone(),
};

pub const MODEL: Column<StorageUnitRecord> = Column {
    header: "Model",
    aliases: &["device model"],
    value: |r| r.model.clone(),
};

pub const DB_DEVICE: Column<StorageUnitRecord> = Column {
    header: "DB Device",
    aliases: &["db", "metadata device", "db path"],
    value: |r| r.metadata_device_path.clone(),
};

pub const DB_SIZE: Column<StorageUnitRecord> = Column {
    header: "DB Size",
    aliases: &["metadata size"],
    value: |r| r.metadata_device_size.clone(),
};

pub const WAL_DEVICE: Column<StorageUnitRecord> = Column {
    header: "WAL Device",
    aliases: &["wal", "log device", "wal path"],
    value: |r| r.log_device_path.clone(),
};

pub const WAL_SIZE: Column<StorageUnitRecord> = Column {
    header: "WAL Size",
    aliases: &["log size"],
    value: |r| r.log_device_size.clone(),
};

/// Condensed mapping table
pub const MAPPING_COLUMNS: [Column<StorageUnitRecord>; 6] =
    [OSD_ID, BLOCK_DEVICE, DEVICE_PATH, DEVICE_TYPE, DB_DEVICE, WAL_DEVICE];

/// Detailed disk table
pub const DETAILED_COLUMNS: [Column<StorageUnitRecord>; 9] = [
    OSD_ID,
    DEVICE_PATH,
    DEVICE_TYPE,
    SIZE,
    MODEL,
    DB_DEVICE,
    DB_SIZE,
    WAL_DEVICE,
    WAL_SIZE,
];

pub const POOL_NAME: Column<PoolUsage> = Column {
    header: "Pool",
    aliases: &["name", "pool name"],
    value: |p| p.name.clone(),
};

pub const POOL_SIZE: Column<PoolUsage> = Column {
    header: "Size",
    aliases: &["capacity"],
    value: |p| p.size.clone(),
};

pub const POOL_USED: Column<PoolUsage> = Column {
    header: "Used",
    aliases: &["stored"],
    value: |p| p.used.clone(),
};

pub const POOL_AVAILABLE: Column<PoolUsage> = Column {
    header: "Available",
    aliases: &["avail", "max avail", "free"],
    value: |p| p.available.clone(),
};

pub const POOL_PERCENT: Column<PoolUsage> = Column {
    header: "% Used",
    aliases: &["%used", "percent used", "used %"],
    value: |p| p.percent_used.clone(),
};

/// Pool usage table
pub const POOL_COLUMNS: [Column<PoolUsage>; 5] =
    [POOL_NAME, POOL_SIZE, POOL_USED, POOL_AVAILABLE, POOL_PERCENT];

// =============================================================================
// Rendering
// =============================================================================

/// Escape a value for a table cell; empty values become `Unknown`
pub fn escape_cell(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return UNKNOWN.to_string();
    }

    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\r' => {}
            '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Render rows under a header line and separator
pub fn render_table<T>(columns: &[Column<T>], rows: &[T]) -> String {
    let mut out = String::new();

    let headers: Vec<&str> = columns.iter().map(|c| c.header).collect();
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(columns.len())));

    for row in rows {
        let cells: Vec<String> = columns.iter().map(|c| escape_cell(&(c.value)(row))).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    out
}

// =============================================================================
// Parsing
// =============================================================================

/// Header names and data rows of one parsed table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse consecutive `|` lines; `None` without a header line
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut rows = lines
            .into_iter()
            .map(str::trim)
            .filter(|l| l.starts_with('|'))
            .map(split_row);

        let headers = rows.next()?;
        let rows = rows
            .filter(|cells| !is_separator(cells))
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect();

        Some(Self { headers, rows })
    }

    /// Position of a column in this table
    pub fn index_of<T>(&self, column: &Column<T>) -> Option<usize> {
        self.headers.iter().position(|h| column.matches(h))
    }

    /// Cell of `row` under `column`, `None` if the column is absent
    pub fn cell<'r, T>(&self, row: &'r [String], column: &Column<T>) -> Option<&'r str> {
        self.index_of(column)
            .and_then(|i| row.get(i))
            .map(String::as_str)
    }
}

fn is_padding(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Trim Unicode whitespace and zero-width padding
pub fn clean_cell(cell: &str) -> &str {
    cell.trim_matches(is_padding)
}

/// Split a table line on unescaped `|`, unescaping cell content
pub fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = line.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('|') | Some('\\') => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                _ => current.push(c),
            },
            '|' => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);

    // Text before the leading pipe and after the trailing pipe
    if cells.first().is_some_and(|c| clean_cell(c).is_empty()) {
        cells.remove(0);
    }
    if cells.len() > 1 && cells.last().is_some_and(|c| clean_cell(c).is_empty()) {
        cells.pop();
    }

    cells.iter().map(|c| clean_cell(c).to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| {
            let c = c.trim_matches(':');
            !c.is_empty() && c.chars().all(|ch| ch == '-')
        })
}
