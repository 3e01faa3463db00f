//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │       NodeHost │ RemoteConnector │ RemoteSession            │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ LocalHost │ MockHost │ OpenSshConnector                     │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cephscope::adapters::LocalHost;
//! use cephscope::collector::{Collector, CollectorConfig};
//!
//! let collector = Collector::new(LocalHost::new(), CollectorConfig::default());
//! let report = collector.run().await?;
//! ```

mod local_host;
mod mock_host;
mod openssh;

pub use local_host::LocalHost;
pub use mock_host::MockHost;
pub use openssh::OpenSshConnector;
