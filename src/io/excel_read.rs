use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};

use crate::error::{KbError, Result};
use crate::model::{Table, TableKind, TableSet};

/// Reads the Lakes and Reports tables from a workbook written by Excel or by
/// [`excel_write`](crate::io::excel_write).
///
/// Sheets are located by name first and by position otherwise; see
/// [`TableKind::select_sheet`].
pub fn read_tables(path: &Path) -> Result<TableSet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    let lakes = read_kind(&mut workbook, &sheet_names, TableKind::Lakes)?;
    let reports = read_kind(&mut workbook, &sheet_names, TableKind::Reports)?;

    Ok(TableSet::new(lakes, reports))
}

fn read_kind<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    sheet_names: &[String],
    kind: TableKind,
) -> Result<Table> {
    let idx = kind
        .select_sheet(sheet_names)
        .ok_or_else(|| KbError::InvalidWorkbook("workbook has no sheets".into()))?;
    let name = &sheet_names[idx];
    let range = workbook
        .worksheet_range(name)
        .ok_or_else(|| KbError::InvalidWorkbook(format!("missing sheet '{name}'")))??;
    Ok(Table::from_grid(range_to_grid(&range)))
}

/// Converts a sheet range into a string grid anchored at column A.
///
/// Leading blank rows are dropped so the first populated row is the header.
fn range_to_grid(range: &Range<DataType>) -> Vec<Vec<String>> {
    let leading_cols = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    range
        .rows()
        .map(|row| {
            let mut cells = vec![String::new(); leading_cols];
            cells.extend(row.iter().map(|cell| cell_to_string(Some(cell))));
            cells
        })
        .skip_while(|cells| cells.iter().all(String::is_empty))
        .collect()
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{value:.0}")
        }
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
