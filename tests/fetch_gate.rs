// tests/fetch_gate.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rank_projector::fetch::types::PageSource;
use rank_projector::fetch::ContentFetcher;
use tokio::task::JoinSet;

/// Records the highest number of concurrent `get` calls.
struct SlowSource {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
    delay: Duration,
    body: &'static str,
}

impl SlowSource {
    fn new(delay: Duration, body: &'static str) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            delay,
            body,
        }
    }
}

#[async_trait]
impl PageSource for SlowSource {
    async fn get(&self, _url: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.body.to_string())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn gate_bounds_in_flight_fetches() {
    let src = Arc::new(SlowSource::new(Duration::from_millis(30), "<td>ok</td>"));
    let fetcher = ContentFetcher::new(src.clone(), 3, Duration::from_secs(5));

    let mut set = JoinSet::new();
    for i in 0..12 {
        let f = fetcher.clone();
        set.spawn(async move { f.fetch(&format!("http://t/{i}")).await });
    }
    let mut ok = 0;
    while let Some(r) = set.join_next().await {
        if r.unwrap().is_some() {
            ok += 1;
        }
    }

    assert_eq!(ok, 12);
    assert!(src.max_seen.load(Ordering::SeqCst) <= 3);
    assert_eq!(fetcher.available_slots(), 3);
}

#[tokio::test]
async fn shared_gate_is_one_budget() {
    let src = Arc::new(SlowSource::new(Duration::from_millis(1), "<td>ok</td>"));
    let a = ContentFetcher::new(src.clone(), 2, Duration::from_secs(1));
    let b = ContentFetcher::with_gate(src, a.gate(), Duration::from_secs(1));
    let _held = a.gate().acquire_owned().await.unwrap();
    assert_eq!(b.available_slots(), 1);
}

#[tokio::test]
async fn slow_source_times_out_to_absent() {
    let src = Arc::new(SlowSource::new(Duration::from_millis(500), "<td>late</td>"));
    let fetcher = ContentFetcher::new(src, 1, Duration::from_millis(20));
    assert_eq!(fetcher.fetch("http://t/slow").await, None);
    assert_eq!(fetcher.available_slots(), 1);
}

#[tokio::test]
async fn no_data_page_is_absent() {
    let src = Arc::new(SlowSource::new(
        Duration::from_millis(1),
        "<html><body>No data available</body></html>",
    ));
    let fetcher = ContentFetcher::new(src, 1, Duration::from_secs(1));
    assert_eq!(fetcher.fetch("http://t/empty").await, None);
}
