use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series carry descriptions in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "Page fetches admitted through the gate.");
        describe_counter!(
            "fetch_failures_total",
            "Fetches that failed with a transport error or timeout."
        );
        describe_counter!(
            "fetch_no_data_total",
            "Fetches that returned an empty or 'no data available' page."
        );
        describe_counter!(
            "extract_cache_hits_total",
            "Extractions served from the fingerprint cache."
        );
        describe_counter!(
            "extract_cache_misses_total",
            "Extractions that required parsing the page."
        );
        describe_histogram!("extract_parse_ms", "Rank page parse time in milliseconds.");
        describe_counter!(
            "ranks_missing_total",
            "Expected categories filled with the unavailable sentinel."
        );
        describe_counter!("projections_built_total", "Projection records produced.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text for everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}
