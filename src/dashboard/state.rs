//! Dashboard State
//!
//! The parsed reports the dashboard serves from. Loaded at startup and
//! swapped wholesale on reload; request handlers take a snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::metrics::DashboardMetrics;
use crate::error::Result;
use crate::report::{load_reports, ParsedReport};

pub struct DashboardState {
    output_dir: PathBuf,
    reports: RwLock<Arc<Vec<ParsedReport>>>,
    metrics: DashboardMetrics,
}

impl DashboardState {
    /// State over already parsed reports
    pub fn new(output_dir: impl Into<PathBuf>, reports: Vec<ParsedReport>) -> Result<Self> {
        let metrics = DashboardMetrics::new()?;
        metrics.observe(&reports);
        Ok(Self {
            output_dir: output_dir.into(),
            reports: RwLock::new(Arc::new(reports)),
            metrics,
        })
    }

    /// Parse every report in `output_dir`
    pub async fn load(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        let reports = load_reports(&output_dir).await;
        info!(dir = %output_dir.display(), reports = reports.len(), "Reports loaded");
        Self::new(output_dir, reports)
    }

    /// Re-read the output directory, returning the number of reports
    pub async fn reload(&self) -> usize {
        let reports = load_reports(&self.output_dir).await;
        let count = reports.len();
        self.metrics.observe(&reports);
        *self.reports.write() = Arc::new(reports);
        debug!(reports = count, "Reports reloaded");
        count
    }

    /// Current reports
    pub fn reports(&self) -> Arc<Vec<ParsedReport>> {
        self.reports.read().clone()
    }

    /// Report of one node by name
    pub fn find(&self, node: &str) -> Option<ParsedReport> {
        self.reports.read().iter().find(|r| r.node() == node).cloned()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn metrics(&self) -> &DashboardMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_find_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ceph-details-output-node-a.md"), "Node: node-a\n").unwrap();

        let state = DashboardState::load(dir.path()).await.unwrap();
        assert_eq!(state.reports().len(), 1);
        assert!(state.find("node-a").is_some());
        assert!(state.find("node-b").is_none());

        std::fs::write(dir.path().join("ceph-details-output-node-b.md"), "").unwrap();
        assert_eq!(state.reload().await, 2);
        assert!(state.find("node-b").is_some());
    }
}
