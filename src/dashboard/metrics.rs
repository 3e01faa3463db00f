//! Dashboard Metrics
//!
//! Prometheus gauges describing the loaded reports, on a registry owned
//! by the dashboard rather than the process-global one.

use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::domain::record::DeviceClass;
use crate::error::Result;
use crate::report::ParsedReport;

pub struct DashboardMetrics {
    registry: Registry,
    reports_loaded: IntGauge,
    units: IntGaugeVec,
    unresolved: IntGaugeVec,
    requests: IntCounterVec,
}

impl DashboardMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reports_loaded = IntGauge::new("cephscope_reports_loaded", "Number of node reports loaded")?;
        let units = IntGaugeVec::new(
            Opts::new("cephscope_osds", "OSDs per node and device class"),
            &["node", "class"],
        )?;
        let unresolved = IntGaugeVec::new(
            Opts::new(
                "cephscope_osds_unresolved",
                "OSDs whose backing device could not be determined",
            ),
            &["node"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("cephscope_http_requests_total", "Dashboard requests by route"),
            &["route"],
        )?;

        registry.register(Box::new(reports_loaded.clone()))?;
        registry.register(Box::new(units.clone()))?;
        registry.register(Box::new(unresolved.clone()))?;
        registry.register(Box::new(requests.clone()))?;

        Ok(Self {
            registry,
            reports_loaded,
            units,
            unresolved,
            requests,
        })
    }

    /// Replace the report gauges with the given reports
    pub fn observe(&self, reports: &[ParsedReport]) {
        self.units.reset();
        self.unresolved.reset();
        self.reports_loaded.set(reports.len() as i64);

        for report in reports {
            for class in DeviceClass::all() {
                let class_name = class.to_string();
                let count = report
                    .report
                    .units
                    .iter()
                    .filter(|u| u.device_class == class)
                    .count();
                self.units
                    .with_label_values(&[report.node(), class_name.as_str()])
                    .set(count as i64);
            }
            self.unresolved
                .with_label_values(&[report.node()])
                .set(report.report.unresolved_count() as i64);
        }
    }

    pub fn record_request(&self, route: &str) {
        self.requests.with_label_values(&[route]).inc();
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
