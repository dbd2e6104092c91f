use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::Table;

/// File name of a Lakes export taken on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("lakes_data_{}.csv", date.format("%Y%m%d"))
}

/// Serialises `table` as CSV text, header first.
pub fn to_csv_string(table: &Table) -> Result<String> {
    if table.columns.is_empty() {
        return Ok(String::new());
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Writes `table` into `dir` under a date-stamped name and returns the path.
pub fn export_lakes(table: &Table, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let path = dir.join(export_file_name(date));
    std::fs::write(&path, to_csv_string(table)?)?;
    Ok(path)
}
