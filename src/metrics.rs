// src/metrics.rs
use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct TrendMetrics {
    pub handle: PrometheusHandle,
}

impl TrendMetrics {
    /// Install the global Prometheus recorder. Only one recorder may exist per
    /// process; a second call fails.
    pub fn init() -> Result<Self> {
        // Default buckets; histogram tuning is not worth version-specific API.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Prometheus exposition text of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
