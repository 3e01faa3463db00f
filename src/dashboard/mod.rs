//! Dashboard
//!
//! Read-only web view over the reports in the output directory:
//!
//! - **Grouping** (`grouping.rs`) - per node SSD/HDD/Unknown buckets and the text filter
//! - **Pages** (`html.rs`) - overview and grouped HTML
//! - **Metrics** (`metrics.rs`) - Prometheus gauges for the loaded reports
//! - **Server** (`server.rs`) - routing and the HTTP/1 accept loop

pub mod grouping;
pub mod html;
pub mod metrics;
pub mod server;
pub mod state;

pub use grouping::{ClassGroup, GroupedUnit, GroupedView, NodeGroup};
pub use metrics::DashboardMetrics;
pub use server::{bind_addr, route, serve, spawn_reloader};
pub use state::DashboardState;
