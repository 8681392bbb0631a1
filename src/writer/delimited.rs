// src/writer/delimited.rs
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use super::{table_rows, OutputFormat, ProjectionWriter, COLUMNS};
use crate::projection::ProjectionRecord;

/// Delimited text with RFC 4180 style quoting.
pub struct DelimitedWriter {
    delimiter: char,
}

impl DelimitedWriter {
    pub fn csv() -> Self {
        Self { delimiter: ',' }
    }

    pub fn tsv() -> Self {
        Self { delimiter: '\t' }
    }

    fn escape(&self, field: &str) -> String {
        let needs_quotes = field.contains(self.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');
        if needs_quotes {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn line<S: AsRef<str>>(&self, fields: &[S]) -> String {
        let sep = self.delimiter.to_string();
        fields
            .iter()
            .map(|f| self.escape(f.as_ref()))
            .collect::<Vec<_>>()
            .join(&sep)
    }

    pub fn render(&self, records: &[ProjectionRecord]) -> String {
        let mut out = self.line(&COLUMNS);
        out.push('\n');
        for row in table_rows(records) {
            out.push_str(&self.line(&row));
            out.push('\n');
        }
        out
    }
}

impl ProjectionWriter for DelimitedWriter {
    fn format(&self) -> OutputFormat {
        if self.delimiter == '\t' {
            OutputFormat::Tsv
        } else {
            OutputFormat::Csv
        }
    }

    fn write_records(&self, records: &[ProjectionRecord], dest: &Path) -> Result<()> {
        let file =
            File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        let mut w = BufWriter::new(file);
        w.write_all(self.render(records).as_bytes())
            .with_context(|| format!("writing {}", dest.display()))?;
        w.flush().context("flushing delimited output")?;
        Ok(())
    }
}
