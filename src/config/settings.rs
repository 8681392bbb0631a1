// src/config/settings.rs
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extract::DEFAULT_CACHE_CAPACITY;
use crate::fetch::sources::DEFAULT_USER_AGENT;
use crate::fetch::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use crate::schedule::DEFAULT_DATE_FORMAT;
use crate::score::ScoringCriteria;
use crate::writer::OutputFormat;

fn default_team_base_url() -> String {
    "https://www.teamrankings.com/mlb/team/".to_string()
}
fn default_team_url_suffix() -> String {
    "/stats".to_string()
}
fn default_schedule_url() -> String {
    "https://www.teamrankings.com/mlb/schedules/?date=".to_string()
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}
fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_team_base_url")]
    pub team_base_url: String,
    #[serde(default = "default_team_url_suffix")]
    pub team_url_suffix: String,
    #[serde(default = "default_schedule_url")]
    pub schedule_url: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            team_base_url: default_team_base_url(),
            team_url_suffix: default_team_url_suffix(),
            schedule_url: default_schedule_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            date_format: default_date_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Optional append-only log file, in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

/// Everything a run needs. Built once and handed to component constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Page labels. Their order is the order of the per-category breakdown.
    pub categories: Vec<String>,
    pub scoring_criteria: ScoringCriteria,
    #[serde(default)]
    pub team_name_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Scoring criteria ordered like `categories`.
    pub fn criteria(&self) -> ScoringCriteria {
        self.scoring_criteria.ordered_by(&self.categories)
    }
}
