use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::Result;
use crate::model::{Table, TableSet};

/// Sheet names used whenever this crate writes a workbook.
pub const LAKES_SHEET: &str = "Lakes";
pub const REPORTS_SHEET: &str = "Reports";

/// Writes both tables to `path`, replacing any existing file.
pub fn write_tables(path: &Path, tables: &TableSet) -> Result<()> {
    let mut workbook = Workbook::new();

    write_sheet(workbook.add_worksheet(), LAKES_SHEET, &tables.lakes)?;
    write_sheet(workbook.add_worksheet(), REPORTS_SHEET, &tables.reports)?;

    workbook.save(path)?;
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, name: &str, table: &Table) -> Result<()> {
    worksheet.set_name(name)?;

    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    if !table.columns.is_empty() {
        worksheet.set_freeze_panes(1, 0)?;
    }
    Ok(())
}
