//! # Schedule
//! Matchups, schedule page scraping and date grouping.
//!
//! Grouping results are memoized under a stable fingerprint of the matchup
//! set (SHA-256 over sorted `date|home|away` lines), so an identical schedule
//! is grouped once regardless of input order.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::BoundedCache;
use crate::fetch::ContentFetcher;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

static MATCHUP_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.text-left.nowrap a").expect("matchup link selector"));
static RANK_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[0-9]*").expect("rank prefix regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matchup {
    pub home: String,
    pub away: String,
    pub date: NaiveDate,
}

impl Matchup {
    pub fn new(home: impl Into<String>, away: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
            date,
        }
    }

    /// "Away at Home", the way schedules print it.
    pub fn label(&self) -> String {
        format!("{} at {}", self.away, self.home)
    }
}

/// The `period_days` days ending yesterday, oldest first.
pub fn backtest_dates(today: NaiveDate, period_days: u32) -> Vec<NaiveDate> {
    if period_days == 0 {
        return Vec::new();
    }
    let end = today - Duration::days(1);
    let start = end - Duration::days(i64::from(period_days) - 1);
    (0..i64::from(period_days))
        .map(|i| start + Duration::days(i))
        .collect()
}

/// Matchups listed on one schedule page.
pub fn parse_schedule_page(html: &str, date: NaiveDate) -> Vec<Matchup> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();
    for link in document.select(&MATCHUP_LINKS) {
        let is_matchup = link
            .value()
            .attr("href")
            .is_some_and(|href| href.contains("matchup"));
        if !is_matchup {
            continue;
        }
        let text = link.text().collect::<String>();
        let names = RANK_PREFIX.replace_all(&text, "");
        let parts: Vec<&str> = names.split(" at ").map(str::trim).collect();
        match parts.as_slice() {
            [away, home] if !away.is_empty() && !home.is_empty() => {
                info!(%date, %home, %away, "processed matchup");
                out.push(Matchup::new(*home, *away, date));
            }
            _ => warn!(%date, text = %names.trim(), "unrecognized matchup link"),
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct MatchupRow {
    #[serde(default)]
    home: String,
    #[serde(default)]
    away: String,
    #[serde(default)]
    date: String,
}

/// Read a schedule document: a JSON array of `{home, away, date}` objects.
/// Rows with missing teams or dates not matching `date_format` are skipped.
pub fn parse_matchups(value: &serde_json::Value, date_format: &str) -> Result<Vec<Matchup>> {
    let rows = value
        .as_array()
        .ok_or_else(|| anyhow!("schedule must be a list of matchups"))?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let row: MatchupRow = match serde_json::from_value(row.clone()) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed matchup row");
                continue;
            }
        };
        let (home, away) = (row.home.trim(), row.away.trim());
        if home.is_empty() || away.is_empty() {
            warn!(date = %row.date, "incomplete matchup data");
            continue;
        }
        match NaiveDate::parse_from_str(row.date.trim(), date_format) {
            Ok(date) => out.push(Matchup::new(home, away, date)),
            Err(_) => warn!(date = %row.date, format = %date_format, "invalid date format"),
        }
    }
    Ok(out)
}

pub fn load_matchups(path: &Path, date_format: &str) -> Result<Vec<Matchup>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading schedule from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("parsing schedule json")?;
    parse_matchups(&value, date_format)
}

/// Matchups per date; each day is sorted by (home, away) so the result does
/// not depend on input order.
pub fn group_by_date(matchups: &[Matchup]) -> BTreeMap<NaiveDate, Vec<Matchup>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Matchup>> = BTreeMap::new();
    for m in matchups {
        grouped.entry(m.date).or_default().push(m.clone());
    }
    for day in grouped.values_mut() {
        day.sort_by(|a, b| (&a.home, &a.away).cmp(&(&b.home, &b.away)));
    }
    grouped
}

/// Order-independent SHA-256 over the matchup identifiers, hex encoded.
pub fn schedule_fingerprint(matchups: &[Matchup]) -> String {
    use sha2::{Digest, Sha256};
    let mut lines: Vec<String> = matchups
        .iter()
        .map(|m| format!("{}|{}|{}", m.date, m.home, m.away))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// `group_by_date` memoized by schedule fingerprint.
pub struct ScheduleGrouper {
    cache: Mutex<BoundedCache<String, BTreeMap<NaiveDate, Vec<Matchup>>>>,
}

impl ScheduleGrouper {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            cache: Mutex::new(BoundedCache::new(capacity)?),
        })
    }

    pub fn group(&self, matchups: &[Matchup]) -> BTreeMap<NaiveDate, Vec<Matchup>> {
        let key = schedule_fingerprint(matchups);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(&key) {
            debug!(%key, "schedule grouping cache hit");
            return hit.clone();
        }
        let grouped = group_by_date(matchups);
        cache.put(key, grouped.clone());
        grouped
    }
}

/// Scrapes daily schedule pages through the shared fetch gate.
pub struct ScheduleCollector {
    fetcher: ContentFetcher,
    base_url: String,
    date_format: String,
}

impl ScheduleCollector {
    pub fn new(fetcher: ContentFetcher, base_url: &str, date_format: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_string(),
            date_format: date_format.to_string(),
        }
    }

    pub fn schedule_url(&self, date: NaiveDate) -> String {
        format!("{}{}", self.base_url, date.format(&self.date_format))
    }

    /// Fetch every date concurrently; matchups come back in date order.
    /// Dates whose page could not be fetched contribute nothing.
    pub async fn collect(&self, dates: &[NaiveDate]) -> Vec<Matchup> {
        let mut set = JoinSet::new();
        for &date in dates {
            let fetcher = self.fetcher.clone();
            let url = self.schedule_url(date);
            info!(%url, "fetching schedule");
            set.spawn(async move { (date, fetcher.fetch(&url).await) });
        }

        let mut pages: HashMap<NaiveDate, String> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((date, Some(html))) => {
                    pages.insert(date, html);
                }
                Ok((date, None)) => warn!(%date, "no schedule page for date"),
                Err(e) => error!(error = %e, "schedule fetch task failed"),
            }
        }

        let mut out = Vec::new();
        for date in dates {
            if let Some(html) = pages.get(date) {
                out.extend(parse_schedule_page(html, *date));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DEFAULT_DATE_FORMAT).unwrap()
    }

    #[test]
    fn backtest_window_ends_yesterday() {
        let dates = backtest_dates(d("2024-05-10"), 3);
        assert_eq!(dates, vec![d("2024-05-07"), d("2024-05-08"), d("2024-05-09")]);
        assert!(backtest_dates(d("2024-05-10"), 0).is_empty());
    }

    #[test]
    fn schedule_page_yields_away_at_home_pairs() {
        let html = r#"<table><tr>
            <td class="text-left nowrap"><a href="/mlb/matchup/yankees-red-sox">#3 New York Yankees at #12 Boston Red Sox</a></td>
            <td class="text-left nowrap"><a href="/mlb/team/yankees">New York Yankees</a></td>
            <td class="text-left nowrap"><a href="/mlb/matchup/broken">Nobody</a></td>
        </tr></table>"#;
        let games = parse_schedule_page(html, d("2024-05-09"));
        assert_eq!(games, vec![Matchup::new("Boston Red Sox", "New York Yankees", d("2024-05-09"))]);
    }

    #[test]
    fn schedule_rows_with_bad_dates_are_skipped() {
        let v = serde_json::json!([
            {"home": "Cubs", "away": "Mets", "date": "2024-05-09"},
            {"home": "Cubs", "away": "Mets", "date": "05/09/2024"},
            {"home": "", "away": "Mets", "date": "2024-05-09"}
        ]);
        let games = parse_matchups(&v, DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(games.len(), 1);
        assert!(parse_matchups(&serde_json::json!({"home": "Cubs"}), DEFAULT_DATE_FORMAT).is_err());
    }

    #[test]
    fn fingerprint_ignores_order_and_grouping_is_memoized() {
        let a = Matchup::new("Cubs", "Mets", d("2024-05-09"));
        let b = Matchup::new("Twins", "Rays", d("2024-05-08"));
        assert_eq!(
            schedule_fingerprint(&[a.clone(), b.clone()]),
            schedule_fingerprint(&[b.clone(), a.clone()])
        );
        assert_ne!(schedule_fingerprint(&[a.clone()]), schedule_fingerprint(&[b.clone()]));

        let grouper = ScheduleGrouper::new(4).unwrap();
        let g = grouper.group(&[a.clone(), b.clone()]);
        assert_eq!(g.keys().copied().collect::<Vec<_>>(), vec![d("2024-05-08"), d("2024-05-09")]);
        assert_eq!(grouper.group(&[b, a]), g);
    }

    #[test]
    fn same_day_order_is_stable_across_cache_hits() {
        let a = Matchup::new("Twins", "Rays", d("2024-05-09"));
        let b = Matchup::new("Cubs", "Mets", d("2024-05-09"));
        let grouper = ScheduleGrouper::new(4).unwrap();
        let first = grouper.group(&[a.clone(), b.clone()]);
        let second = grouper.group(&[b, a]);
        let homes: Vec<&str> = second[&d("2024-05-09")].iter().map(|m| m.home.as_str()).collect();
        assert_eq!(homes, vec!["Cubs", "Twins"]);
        assert_eq!(first, second);
    }
}
