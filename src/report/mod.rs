//! Markdown Reports
//!
//! The report file is the only interface between a collector on a storage
//! node and the dashboard on the control host.
//!
//! ```text
//! NodeReport ──► writer ──► ceph-mapping.md ──(scp)──► parser ──► ParsedReport
//! ```

pub mod parser;
mod proptest;
pub mod table;
pub mod writer;

pub use parser::{load_reports, parse_report, parse_report_file, ParsedReport};
pub use writer::{render_report, write_report};
