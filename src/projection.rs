//! # Projection orchestration
//! Drives fetch → extract → validate → score across a set of matchups.
//!
//! Ranks are fetched once per team per run: every distinct team that is not
//! memoized yet is fetched concurrently (the fetcher's admission gate bounds
//! how many are in flight), and results are reassembled by team key rather
//! than completion order. Failed fetches are memoized too, so a run never
//! retries a team. Memo entries are keyed by team and requested category
//! list, so a different list triggers a fresh fetch.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::extract::{validate_ranks, RankExtractor, RankMap};
use crate::resolve::{team_key, UrlResolver};
use crate::schedule::{parse_matchups, Matchup};
use crate::score::{score, CategoryScore, PointAward, ScoringCriteria, Winner};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRecord {
    pub matchup: Matchup,
    pub per_category: Vec<CategoryScore>,
    pub home_total: u32,
    pub away_total: u32,
    pub delta: i32,
    pub winner: Winner,
}

impl ProjectionRecord {
    /// Projected winner's team name, or `"Tie"`.
    pub fn winner_name(&self) -> &str {
        match self.winner {
            Winner::Home => &self.matchup.home,
            Winner::Away => &self.matchup.away,
            Winner::Tie => "Tie",
        }
    }

    pub fn award_name(&self, award: PointAward) -> &str {
        match award {
            PointAward::Home => &self.matchup.home,
            PointAward::Away => &self.matchup.away,
            PointAward::None => "None",
        }
    }
}

/// (team key, category list digest)
type MemoKey = (String, u64);

pub struct Projector {
    extractor: Arc<RankExtractor>,
    memo: Mutex<HashMap<MemoKey, RankMap>>,
}

impl Projector {
    pub fn new(extractor: Arc<RankExtractor>) -> Self {
        Self {
            extractor,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Memo entries, one per (team, category list) fetched this run.
    pub fn memoized_teams(&self) -> usize {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn build_projections(
        &self,
        matchups: &[Matchup],
        criteria: &ScoringCriteria,
        resolver: &dyn UrlResolver,
        categories: &[String],
    ) -> Vec<ProjectionRecord> {
        info!(matchups = matchups.len(), "starting to calculate projections");

        let usable: Vec<&Matchup> = matchups.iter().filter(|m| is_usable(m)).collect();
        let teams: BTreeMap<String, String> = usable
            .iter()
            .flat_map(|m| [m.home.trim(), m.away.trim()])
            .map(|name| (team_key(name), name.to_string()))
            .collect();
        let digest = categories_digest(categories);
        self.prefetch(teams, digest, resolver, categories).await;

        let memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        let mut projections = Vec::with_capacity(usable.len());
        for m in usable {
            let empty = RankMap::new();
            let home_raw = memo.get(&(team_key(&m.home), digest)).unwrap_or(&empty);
            let away_raw = memo.get(&(team_key(&m.away), digest)).unwrap_or(&empty);
            if home_raw.is_empty() || away_raw.is_empty() {
                warn!(matchup = %m.label(), date = %m.date, "no ranks for one side, matchup skipped");
                continue;
            }

            let home = validate_ranks(home_raw, categories);
            let away = validate_ranks(away_raw, categories);
            let outcome = score(&home, &away, criteria);
            let winner = outcome.winner();

            info!(
                matchup = %m.label(),
                date = %m.date,
                delta = outcome.delta,
                winner = ?winner,
                "projection built"
            );
            projections.push(ProjectionRecord {
                matchup: m.clone(),
                home_total: outcome.home_points,
                away_total: outcome.away_points,
                delta: outcome.delta,
                winner,
                per_category: outcome.per_category,
            });
        }

        counter!("projections_built_total").increment(projections.len() as u64);
        info!(count = projections.len(), "projections calculated");
        projections
    }

    /// Untyped boundary: `matchups` must be a JSON array and `criteria` a
    /// JSON object. Anything else is logged and yields no projections.
    pub async fn build_projections_from_value(
        &self,
        matchups: &serde_json::Value,
        criteria: &serde_json::Value,
        resolver: &dyn UrlResolver,
        categories: &[String],
        date_format: &str,
    ) -> Vec<ProjectionRecord> {
        if !matchups.is_array() || !criteria.is_object() {
            error!("invalid data types provided: expected a matchup list and a criteria mapping");
            return Vec::new();
        }
        let matchups = match parse_matchups(matchups, date_format) {
            Ok(m) => m,
            Err(e) => {
                error!(error = ?e, "invalid matchups");
                return Vec::new();
            }
        };
        let criteria: ScoringCriteria = match serde_json::from_value(criteria.clone()) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "invalid scoring criteria");
                return Vec::new();
            }
        };
        self.build_projections(&matchups, &criteria, resolver, categories)
            .await
    }

    /// `teams` maps team key → display name.
    async fn prefetch(
        &self,
        teams: BTreeMap<String, String>,
        digest: u64,
        resolver: &dyn UrlResolver,
        categories: &[String],
    ) {
        let pending: Vec<(String, String)> = {
            let memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
            teams
                .into_iter()
                .filter(|(key, _)| !memo.contains_key(&(key.clone(), digest)))
                .collect()
        };
        if pending.is_empty() {
            return;
        }

        let categories: Arc<[String]> = categories.into();
        let mut set = JoinSet::new();
        for (key, team) in pending {
            let url = resolver.resolve(&team);
            let extractor = Arc::clone(&self.extractor);
            let categories = Arc::clone(&categories);
            set.spawn(async move {
                let ranks = extractor
                    .fetch_and_extract(&url, &team, &categories[..])
                    .await;
                (key, ranks)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((key, ranks)) => {
                    self.memo
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert((key, digest), ranks);
                }
                Err(e) => error!(error = %e, "rank fetch task failed"),
            }
        }
    }
}

fn categories_digest(categories: &[String]) -> u64 {
    let mut h = DefaultHasher::new();
    categories.hash(&mut h);
    h.finish()
}

fn is_usable(m: &Matchup) -> bool {
    let (home, away) = (team_key(&m.home), team_key(&m.away));
    if home.is_empty() || away.is_empty() {
        warn!(date = %m.date, "incomplete matchup data");
        return false;
    }
    if home == away {
        warn!(team = %m.home, date = %m.date, "team scheduled against itself");
        return false;
    }
    true
}
