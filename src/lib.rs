// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod backtest;
pub mod cache;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod projection;
pub mod resolve;
pub mod schedule;
pub mod score;
pub mod writer;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::extract::{validate_ranks, Rank, RankExtractor, RankMap};
pub use crate::fetch::ContentFetcher;
pub use crate::projection::{ProjectionRecord, Projector};
pub use crate::schedule::Matchup;
pub use crate::score::{score, ScoreOutcome, ScoringCriteria, Winner};
pub use crate::writer::{writer_for, OutputFormat, ProjectionWriter};
