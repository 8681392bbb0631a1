// src/writer/json.rs
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use super::{OutputFormat, ProjectionWriter};
use crate::projection::ProjectionRecord;

/// Structured records: the projection list as pretty JSON.
pub struct JsonWriter;

impl ProjectionWriter for JsonWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn write_records(&self, records: &[ProjectionRecord], dest: &Path) -> Result<()> {
        let file =
            File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, records).context("serialize projections")?;
        w.flush().context("flushing json output")?;
        Ok(())
    }
}
