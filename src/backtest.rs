//! Backtest evaluation: compare projected winners with final scores.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::projection::ProjectionRecord;
use crate::resolve::team_key;
use crate::score::Winner;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub home: String,
    pub away: String,
    pub date: NaiveDate,
    pub home_score: u32,
    pub away_score: u32,
}

impl GameResult {
    pub fn winner(&self) -> Winner {
        Winner::from_delta(self.home_score as i32 - self.away_score as i32)
    }

    fn key(&self) -> (NaiveDate, String, String) {
        (self.date, team_key(&self.home), team_key(&self.away))
    }
}

/// JSON array of [`GameResult`] objects, dates as `YYYY-MM-DD`.
pub fn load_results(path: &Path) -> Result<Vec<GameResult>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading results from {}", path.display()))?;
    serde_json::from_str(&raw).context("parsing results json")
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BacktestSummary {
    pub evaluated: usize,
    pub correct: usize,
    pub skipped: usize,
    pub win_rate: f64,
}

impl fmt::Display for BacktestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Win Rate: {:.2}% ({}/{} correct, {} skipped)",
            self.win_rate * 100.0,
            self.correct,
            self.evaluated,
            self.skipped
        )
    }
}

/// Projected ties, games without a result and drawn games are skipped.
pub fn evaluate(projections: &[ProjectionRecord], results: &[GameResult]) -> BacktestSummary {
    let by_game: HashMap<_, &GameResult> = results.iter().map(|r| (r.key(), r)).collect();

    let mut summary = BacktestSummary::default();
    for p in projections {
        let key = (p.matchup.date, team_key(&p.matchup.home), team_key(&p.matchup.away));
        let actual = by_game.get(&key).map(|r| r.winner());
        match (p.winner, actual) {
            (Winner::Tie, _) | (_, None) | (_, Some(Winner::Tie)) => {
                debug!(matchup = %p.matchup.label(), "not evaluated");
                summary.skipped += 1;
            }
            (projected, Some(actual)) => {
                summary.evaluated += 1;
                if projected == actual {
                    summary.correct += 1;
                }
            }
        }
    }
    if summary.evaluated > 0 {
        summary.win_rate = summary.correct as f64 / summary.evaluated as f64;
    }
    info!(
        evaluated = summary.evaluated,
        correct = summary.correct,
        skipped = summary.skipped,
        "backtest evaluated"
    );
    summary
}
