// src/writer/xlsx.rs
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use super::{table_rows, OutputFormat, ProjectionWriter, COLUMNS};
use crate::projection::ProjectionRecord;

const SHEET_NAME: &str = "Projections";
// Away Rank, Home Rank, Away Point Total, Home Point Total
const NUMERIC_COLUMNS: [usize; 4] = [2, 3, 5, 6];

pub struct XlsxWriter;

impl ProjectionWriter for XlsxWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Xlsx
    }

    fn write_records(&self, records: &[ProjectionRecord], dest: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME).context("name worksheet")?;

        let bold = Format::new().set_bold();
        for (col_idx, title) in COLUMNS.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col_idx as u16, *title, &bold)
                .with_context(|| format!("write header ({col_idx})"))?;
        }
        write_rows(worksheet, &table_rows(records))?;

        workbook
            .save(dest)
            .with_context(|| format!("saving {}", dest.display()))?;
        Ok(())
    }
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        let r = (row_idx + 1) as u32;
        for (col_idx, value) in row.iter().enumerate() {
            let c = col_idx as u16;
            let number = NUMERIC_COLUMNS
                .contains(&col_idx)
                .then(|| value.parse::<f64>().ok())
                .flatten();
            match number {
                Some(n) => worksheet.write_number(r, c, n),
                None => worksheet.write_string(r, c, value),
            }
            .with_context(|| format!("write cell ({r},{c})"))?;
        }
    }
    Ok(())
}
