// src/config/mod.rs
pub mod settings;

pub use settings::{
    AppConfig, CacheSettings, FetchSettings, LoggingSettings, OutputSettings, SourceSettings,
};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use crate::extract::normalize_category;

pub const ENV_CONFIG_PATH: &str = "PROJECTOR_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/projector.toml";
pub const DEFAULT_JSON_PATH: &str = "config/projector.json";

const ENV_CACHE_SIZE: &str = "CACHE_SIZE";
const ENV_DATE_FORMAT: &str = "DATE_FORMAT";
const ENV_LOG_FILENAME: &str = "LOG_FILENAME";

impl AppConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Discover the config:
    /// 1) $PROJECTOR_CONFIG_PATH
    /// 2) config/projector.toml
    /// 3) config/projector.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            bail!("{ENV_CONFIG_PATH} points to non-existent path");
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Err(anyhow!(
            "no config found (set {ENV_CONFIG_PATH} or add {DEFAULT_TOML_PATH})"
        ))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_CACHE_SIZE) {
            self.cache.capacity = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CACHE_SIZE} must be a positive integer"))?;
        }
        if let Ok(v) = std::env::var(ENV_DATE_FORMAT) {
            self.output.date_format = v;
        }
        if let Ok(v) = std::env::var(ENV_LOG_FILENAME) {
            self.logging.file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.iter().all(|c| c.trim().is_empty()) {
            bail!("categories must not be empty");
        }
        if self.scoring_criteria.is_empty() {
            bail!("scoring_criteria must not be empty");
        }
        for (k, w) in self.scoring_criteria.iter() {
            if !w.is_finite() || w < 0.0 {
                bail!("weight for '{k}' must be a non-negative number, got {w}");
            }
        }
        if self.cache.capacity == 0 {
            bail!("cache.capacity must be at least 1");
        }
        if self.fetch.concurrency == 0 {
            bail!("fetch.concurrency must be at least 1");
        }
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be greater than 0");
        }

        let known: BTreeSet<String> = self.categories.iter().map(|c| normalize_category(c)).collect();
        for k in self.scoring_criteria.categories() {
            if !known.contains(&normalize_category(k)) {
                warn!(criterion = %k, "scoring criterion matches no configured category");
            }
        }
        Ok(())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => toml::from_str(s)
            .or_else(|_| serde_json::from_str(s))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}
