//! Domain Layer
//!
//! Typed records for what the collector learns about a node, and the ports
//! through which it reaches the outside world.
//!
//! - **Records** (`record.rs`) - one OSD's device mapping
//! - **Reports** (`report.rs`) - one node's snapshot
//! - **Ports** (`ports.rs`) - trait abstractions for hosts and remote servers

pub mod ports;
pub mod record;
pub mod report;

pub use ports::{CommandOutput, NodeHost, NodeHostExt, RemoteConnector, RemoteSession};
pub use record::{DeviceClass, StorageUnitRecord};
pub use report::{ClusterBlocks, NodeReport, PoolUsage};
