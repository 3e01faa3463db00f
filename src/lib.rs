//! cephscope - Ceph OSD Device Mapping Reports
//!
//! Collects, on each storage node, which physical devices back the local
//! Ceph OSDs (with their DB/WAL companions), writes the findings as a
//! markdown report, gathers the reports of many nodes over SSH and serves
//! them as a grouped dashboard.
//!
//! # Architecture
//!
//! The pipeline has three stages joined only by report files:
//!
//! ```text
//! Collector (per node) → report.md → Aggregator (SSH fan-out) → output/ → Dashboard
//! ```
//!
//! # Features
//!
//! - Layered device resolution (ceph-volume, mount source, OSD metadata)
//! - DB/WAL companion discovery with colocation detection
//! - Markdown report emitter and tolerant parser
//! - Concurrent SSH fetch with per-server outcomes
//! - HTML and JSON dashboard with SSD/HDD grouping and filtering
//! - Prometheus metrics
//!
//! # Modules
//!
//! - [`adapters`] - Host and SSH adapters implementing domain ports
//! - [`aggregator`] - Remote collection and report download
//! - [`collector`] - Per-node device resolution
//! - [`config`] - YAML configuration
//! - [`dashboard`] - Grouping, pages and HTTP server
//! - [`domain`] - Records, reports and ports
//! - [`error`] - Error types
//! - [`report`] - Markdown emitter and parser

pub mod adapters;
pub mod aggregator;
pub mod collector;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod report;

// Re-export commonly used types
pub use aggregator::{Aggregator, FetchOptions, FetchSummary};
pub use collector::{Capabilities, Collector, CollectorConfig};
pub use config::Config;
pub use dashboard::{DashboardState, GroupedView};
pub use domain::{DeviceClass, NodeReport, StorageUnitRecord};
pub use error::{Error, Result};
pub use report::{parse_report, render_report, ParsedReport};
