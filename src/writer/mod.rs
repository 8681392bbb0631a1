// src/writer/mod.rs
pub mod delimited;
pub mod json;
pub mod xlsx;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::projection::ProjectionRecord;

pub const COLUMNS: [&str; 8] = [
    "Matchup",
    "Category",
    "Away Rank",
    "Home Rank",
    "Point Awarded To",
    "Away Point Total",
    "Home Point Total",
    "Projected Winner",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
    Json,
    Xlsx,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "txt" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            "xlsx" => Ok(OutputFormat::Xlsx),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(f: OutputFormat) -> Self {
        f.extension().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Persists projection records to a destination file.
pub trait ProjectionWriter {
    fn format(&self) -> OutputFormat;

    fn validate(&self, records: &[ProjectionRecord]) -> Result<()> {
        validate_records(records)
    }

    fn write_records(&self, records: &[ProjectionRecord], dest: &Path) -> Result<()>;

    /// Validate, then write.
    fn write(&self, records: &[ProjectionRecord], dest: &Path) -> Result<()> {
        self.validate(records)?;
        self.write_records(records, dest)
    }
}

pub fn writer_for(format: OutputFormat) -> Box<dyn ProjectionWriter> {
    match format {
        OutputFormat::Csv => Box::new(delimited::DelimitedWriter::csv()),
        OutputFormat::Tsv => Box::new(delimited::DelimitedWriter::tsv()),
        OutputFormat::Json => Box::new(json::JsonWriter),
        OutputFormat::Xlsx => Box::new(xlsx::XlsxWriter),
    }
}

/// Non-empty, and no record lists the same category twice.
pub fn validate_records(records: &[ProjectionRecord]) -> Result<()> {
    if records.is_empty() {
        bail!("no projections to write");
    }
    for r in records {
        let mut seen = HashSet::new();
        for c in &r.per_category {
            if !seen.insert(c.category.as_str()) {
                bail!(
                    "duplicate category '{}' in projection for {}",
                    c.category,
                    r.matchup.label()
                );
            }
        }
    }
    Ok(())
}

/// Flat table under [`COLUMNS`]: one row per scored category, or a single
/// summary row when nothing could be scored.
pub fn table_rows(records: &[ProjectionRecord]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for r in records {
        let label = format!("{} ({})", r.matchup.label(), r.matchup.date);
        let totals = [r.away_total.to_string(), r.home_total.to_string()];
        if r.per_category.is_empty() {
            rows.push(vec![
                label.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                totals[0].clone(),
                totals[1].clone(),
                r.winner_name().to_string(),
            ]);
            continue;
        }
        for c in &r.per_category {
            rows.push(vec![
                label.clone(),
                c.category.clone(),
                c.away_rank.to_string(),
                c.home_rank.to_string(),
                r.award_name(c.point_awarded_to).to_string(),
                totals[0].clone(),
                totals[1].clone(),
                r.winner_name().to_string(),
            ]);
        }
    }
    rows
}
