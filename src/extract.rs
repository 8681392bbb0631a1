//! # Rank extraction
//! Turns a team statistics page into a category → rank mapping.
//!
//! - Category rows are found by exact (trimmed) text of a `<td>` cell.
//! - The rank sits in the next sibling `<td>` as `(#N)`.
//! - Parsed pages are memoized by content fingerprint, so identical pages are
//!   parsed once per extractor.
//! - `validate_ranks` normalizes keys and fills expected categories that
//!   could not be scraped with [`Rank::Unavailable`].

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use anyhow::Result;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, error, info, warn};

use crate::cache::BoundedCache;
use crate::fetch::ContentFetcher;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Sentinel used in flat outputs for a category that could not be determined.
pub const UNAVAILABLE_SENTINEL: i64 = -1;

static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("td selector"));
static RANK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(#(\d+)\)").expect("rank regex"));

/// A team's position in one category (1 = best), or explicitly unavailable.
///
/// Serialized as a plain integer with `-1` for unavailable, matching the
/// sentinel used by downstream tabular outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    Ranked(u32),
    Unavailable,
}

impl Rank {
    pub fn position(self) -> Option<u32> {
        match self {
            Rank::Ranked(n) => Some(n),
            Rank::Unavailable => None,
        }
    }

    pub fn sentinel_value(self) -> i64 {
        match self {
            Rank::Ranked(n) => i64::from(n),
            Rank::Unavailable => UNAVAILABLE_SENTINEL,
        }
    }

    pub fn from_sentinel(value: i64) -> Self {
        match u32::try_from(value) {
            Ok(n) => Rank::Ranked(n),
            Err(_) => Rank::Unavailable,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sentinel_value())
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.sentinel_value())
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Rank::from_sentinel)
    }
}

/// Category name → rank. Ordered so logs and outputs are stable.
pub type RankMap = BTreeMap<String, Rank>;

/// Lowercase, drop `%`, trim. Idempotent.
pub fn normalize_category(key: &str) -> String {
    key.to_lowercase().replace('%', "").trim().to_string()
}

/// Normalize every key of `raw` and make sure every expected category is
/// present, inserting [`Rank::Unavailable`] for the ones that are missing.
/// Extra keys are kept.
pub fn validate_ranks<S: AsRef<str>>(raw: &RankMap, expected: &[S]) -> RankMap {
    debug!(before = ?raw, "validating ranks");
    let mut out: RankMap = raw
        .iter()
        .map(|(k, v)| (normalize_category(k), *v))
        .collect();

    let missing: BTreeSet<String> = expected
        .iter()
        .map(|k| normalize_category(k.as_ref()))
        .filter(|k| !out.contains_key(k))
        .collect();

    if missing.is_empty() {
        info!("all ranks successfully scraped");
    } else {
        warn!(missing = ?missing, "missing keys in ranks");
        counter!("ranks_missing_total").increment(missing.len() as u64);
        for key in missing {
            out.insert(key, Rank::Unavailable);
        }
    }
    debug!(after = ?out, "validated ranks");
    out
}

/// Fetches team pages and extracts their ranks, memoizing parse results by
/// page fingerprint.
pub struct RankExtractor {
    fetcher: ContentFetcher,
    // Held across lookup, parse and insert so concurrent callers with the
    // same page parse it once.
    cache: Mutex<BoundedCache<u64, RankMap>>,
    parses: AtomicUsize,
}

impl RankExtractor {
    pub fn new(fetcher: ContentFetcher, cache_capacity: usize) -> Result<Self> {
        Ok(Self {
            fetcher,
            cache: Mutex::new(BoundedCache::new(cache_capacity)?),
            parses: AtomicUsize::new(0),
        })
    }

    pub fn fetcher(&self) -> &ContentFetcher {
        &self.fetcher
    }

    /// Number of pages actually parsed (cache misses).
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("extraction cache cleared");
    }

    pub fn extract<S: AsRef<str>>(&self, content: &str, categories: &[S]) -> RankMap {
        debug!(preview = %preview(content), "raw page content");
        let key = fingerprint(content, categories);

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(&key) {
            debug!(key, "extraction cache hit");
            counter!("extract_cache_hits_total").increment(1);
            return hit.clone();
        }
        counter!("extract_cache_misses_total").increment(1);

        let t0 = Instant::now();
        self.parses.fetch_add(1, Ordering::Relaxed);
        let data = parse_ranks(content, categories);
        histogram!("extract_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        cache.put(key, data.clone());
        data
    }

    /// Fetch `url` and extract. A missing page yields an empty map.
    pub async fn fetch_and_extract<S: AsRef<str>>(
        &self,
        url: &str,
        team: &str,
        categories: &[S],
    ) -> RankMap {
        info!(%team, %url, "starting fetch and extraction");
        let Some(content) = self.fetcher.fetch(url).await else {
            error!(%team, %url, "no page content fetched");
            return RankMap::new();
        };
        let ranks = self.extract(&content, categories);
        info!(%team, ranks = ?ranks, "extracted ranks");
        ranks
    }
}

/// Non-cryptographic digest of the page plus the requested category list.
fn fingerprint<S: AsRef<str>>(content: &str, categories: &[S]) -> u64 {
    let mut h = DefaultHasher::new();
    content.hash(&mut h);
    for c in categories {
        c.as_ref().hash(&mut h);
    }
    h.finish()
}

fn preview(content: &str) -> String {
    content.chars().take(100).collect()
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn next_td<'a>(cell: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    cell.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
}

fn parse_ranks<S: AsRef<str>>(html: &str, categories: &[S]) -> RankMap {
    let document = Html::parse_document(html);
    let mut out = RankMap::new();

    for category in categories {
        let category = category.as_ref().trim();
        let Some(label) = document.select(&TD).find(|td| cell_text(td) == category) else {
            warn!(%category, "no category cell found");
            continue;
        };
        debug!(%category, "found category cell");

        let Some(rank_cell) = next_td(&label) else {
            warn!(%category, "no rank cell found");
            continue;
        };

        let text = cell_text(&rank_cell);
        let Some(caps) = RANK_RE.captures(&text) else {
            warn!(%category, cell = %text, "no rank found");
            continue;
        };
        match caps[1].parse::<u32>() {
            Ok(n) => {
                out.insert(category.to_string(), Rank::Ranked(n));
            }
            Err(e) => warn!(%category, error = %e, "rank out of range"),
        }
    }
    out
}
