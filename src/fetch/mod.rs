// src/fetch/mod.rs
pub mod sources;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::fetch::types::PageSource;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const NO_DATA_MARKER: &str = "no data available";

/// True when a page body carries publishable content: not blank and not the
/// site's "no data available" placeholder (case-insensitive).
pub fn has_data(body: &str) -> bool {
    !body.trim().is_empty() && !body.to_lowercase().contains(NO_DATA_MARKER)
}

/// Concurrency-limited page fetcher.
///
/// Every request holds one permit of the admission gate for its whole
/// duration; the permit is an RAII guard, so it is released on success,
/// failure and timeout alike. Failures never escape: they are logged and
/// reported as `None`.
#[derive(Clone)]
pub struct ContentFetcher {
    source: Arc<dyn PageSource>,
    gate: Arc<Semaphore>,
    timeout: Duration,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn PageSource>, concurrency: usize, timeout: Duration) -> Self {
        Self::with_gate(source, Arc::new(Semaphore::new(concurrency.max(1))), timeout)
    }

    /// Build a fetcher that shares an existing admission gate.
    pub fn with_gate(source: Arc<dyn PageSource>, gate: Arc<Semaphore>, timeout: Duration) -> Self {
        Self {
            source,
            gate,
            timeout,
        }
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        Arc::clone(&self.gate)
    }

    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, url: &str) -> Option<String> {
        let _permit = match self.gate.acquire().await {
            Ok(p) => p,
            Err(e) => {
                error!(%url, error = %e, "admission gate closed");
                return None;
            }
        };

        debug!(%url, source = self.source.name(), "starting fetch");
        counter!("fetch_requests_total").increment(1);

        let body = match tokio::time::timeout(self.timeout, self.source.get(url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                error!(%url, error = ?e, "error fetching page");
                counter!("fetch_failures_total", "reason" => "transport").increment(1);
                return None;
            }
            Err(_) => {
                error!(%url, timeout_ms = self.timeout.as_millis() as u64, "fetch timed out");
                counter!("fetch_failures_total", "reason" => "timeout").increment(1);
                return None;
            }
        };

        if !has_data(&body) {
            error!(%url, "no relevant data found");
            counter!("fetch_no_data_total").increment(1);
            return None;
        }
        Some(body)
    }
}
