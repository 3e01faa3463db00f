//! Node Collector
//!
//! Maps each OSD hosted on a storage node to its backing device, DB and
//! WAL devices, and captures the cluster-wide command output that goes
//! into the node's report.
//!
//! # Resolution
//!
//! ```text
//! local OSD ids ──► DeviceResolver ──► existence / class / size / model
//!                        │
//!                        └──► DB + WAL companion resolution ──► record
//! ```

pub mod capabilities;
pub mod cluster;
pub mod companion;
pub mod devices;
mod engine;
pub mod metadata;
pub mod resolver;
pub mod volume_listing;

pub use capabilities::Capabilities;
pub use engine::{Collector, CollectorConfig};
pub use resolver::{DeviceHit, DeviceResolver, DeviceStrategy};
