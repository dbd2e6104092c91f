#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use lakehouse_kb::io::sheets_api::SheetInfo;
use lakehouse_kb::io::SheetsClient;
use lakehouse_kb::model::{Table, TableSet};
use lakehouse_kb::source::{Backend, TableSink, TableSource};
use lakehouse_kb::{KbError, Result};

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|cell| cell.to_string()).collect()
}

pub fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table {
        columns: strings(columns),
        rows: rows.iter().map(|row| strings(row)).collect(),
    }
}

pub fn sample_lakes() -> Table {
    table(
        &[
            "LakeHouse",
            "Folder",
            "Element",
            "URL",
            "Загальна інформація про лейк",
            "Внесення змін",
        ],
        &[
            &["Sales", "Raw", "orders", "https://example.com/orders", "Sales lake", "Reload nightly"],
            &["Sales", "Curated", "revenue", "", "", "See [IMAGE:https://github.com/acme/kb/blob/main/img.png]"],
            &["Finance", "Raw", "ledger", "", "Finance lake", ""],
        ],
    )
}

pub fn sample_reports() -> Table {
    table(
        &["Name", "Workspace", "Owner", "Update_Frequency", "LakeHouse", "Status"],
        &[
            &["Revenue dashboard", "Sales WS", "Olena", "daily", "Sales", "active"],
            &["Ledger audit", "Finance WS", "Petro", "weekly", "Finance", "draft"],
        ],
    )
}

/// Source that hands out fixed tables and counts how often it was asked.
pub struct CountingSource {
    pub id: String,
    pub tables: TableSet,
    pub fetches: Cell<usize>,
}

impl CountingSource {
    pub fn new(id: &str, tables: TableSet) -> Self {
        Self {
            id: id.to_string(),
            tables,
            fetches: Cell::new(0),
        }
    }
}

impl TableSource for CountingSource {
    fn backend(&self) -> Backend {
        Backend::SheetsExport
    }

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn fetch(&self) -> Result<TableSet> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.tables.clone())
    }
}

/// Source whose every fetch fails like a dropped network connection.
pub struct OfflineSource;

impl TableSource for OfflineSource {
    fn backend(&self) -> Backend {
        Backend::SheetsExport
    }

    fn identity(&self) -> String {
        "offline".into()
    }

    fn fetch(&self) -> Result<TableSet> {
        Err(KbError::SourceUnavailable("connection refused".into()))
    }
}

/// Sink that rejects every write.
pub struct RejectingSink;

impl TableSink for RejectingSink {
    fn backend(&self) -> Backend {
        Backend::SheetsApi
    }

    fn store(&self, _tables: &TableSet) -> Result<()> {
        Err(KbError::RemoteApi {
            status: 403,
            message: "The caller does not have permission".into(),
        })
    }
}

/// Spreadsheet client whose every call fails.
pub struct BrokenSheets;

impl BrokenSheets {
    fn fail<T>() -> Result<T> {
        Err(KbError::RemoteApi {
            status: 503,
            message: "backend unavailable".into(),
        })
    }
}

impl SheetsClient for BrokenSheets {
    fn sheets(&self) -> Result<Vec<SheetInfo>> {
        Self::fail()
    }

    fn add_sheet(&self, _title: &str, _rows: usize, _cols: usize) -> Result<()> {
        Self::fail()
    }

    fn resize_sheet(&self, _sheet_id: i64, _rows: usize, _cols: usize) -> Result<()> {
        Self::fail()
    }

    fn clear(&self, _range: &str) -> Result<()> {
        Self::fail()
    }

    fn update(&self, _range: &str, _values: &[Vec<String>]) -> Result<()> {
        Self::fail()
    }

    fn values(&self, _range: &str) -> Result<Vec<Vec<String>>> {
        Self::fail()
    }
}

/// In-memory spreadsheet recording every call it receives.
#[derive(Default)]
pub struct FakeSheets {
    pub sheets: RefCell<Vec<(SheetInfo, Vec<Vec<String>>)>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeSheets {
    pub fn with_sheet(title: &str, rows: usize, cols: usize, grid: Vec<Vec<String>>) -> Self {
        let fake = Self::default();
        fake.sheets.borrow_mut().push((
            SheetInfo {
                sheet_id: 0,
                title: title.to_string(),
                row_count: rows,
                column_count: cols,
            },
            grid,
        ));
        fake
    }

    pub fn grid(&self, title: &str) -> Option<Vec<Vec<String>>> {
        self.sheets
            .borrow()
            .iter()
            .find(|(info, _)| info.title == title)
            .map(|(_, grid)| grid.clone())
    }

    pub fn info(&self, title: &str) -> Option<SheetInfo> {
        self.sheets
            .borrow()
            .iter()
            .find(|(info, _)| info.title == title)
            .map(|(info, _)| info.clone())
    }

    fn with_grid<T>(&self, range: &str, action: impl FnOnce(&mut Vec<Vec<String>>) -> T) -> Result<T> {
        let title = sheet_of(range);
        let mut sheets = self.sheets.borrow_mut();
        let (_, grid) = sheets
            .iter_mut()
            .find(|(info, _)| info.title == title)
            .ok_or_else(|| KbError::RemoteApi {
                status: 400,
                message: format!("Unable to parse range: {range}"),
            })?;
        Ok(action(grid))
    }
}

fn sheet_of(range: &str) -> String {
    let sheet = range.split('!').next().unwrap_or_default();
    sheet
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(sheet)
        .replace("''", "'")
}

impl SheetsClient for FakeSheets {
    fn sheets(&self) -> Result<Vec<SheetInfo>> {
        Ok(self.sheets.borrow().iter().map(|(info, _)| info.clone()).collect())
    }

    fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()> {
        self.calls.borrow_mut().push(format!("add {title} {rows}x{cols}"));
        let mut sheets = self.sheets.borrow_mut();
        let sheet_id = sheets.len() as i64;
        sheets.push((
            SheetInfo {
                sheet_id,
                title: title.to_string(),
                row_count: rows,
                column_count: cols,
            },
            Vec::new(),
        ));
        Ok(())
    }

    fn resize_sheet(&self, sheet_id: i64, rows: usize, cols: usize) -> Result<()> {
        self.calls.borrow_mut().push(format!("resize {sheet_id} {rows}x{cols}"));
        for (info, _) in self.sheets.borrow_mut().iter_mut() {
            if info.sheet_id == sheet_id {
                info.row_count = rows;
                info.column_count = cols;
            }
        }
        Ok(())
    }

    fn clear(&self, range: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("clear {range}"));
        self.with_grid(range, |grid| grid.clear())
    }

    fn update(&self, range: &str, values: &[Vec<String>]) -> Result<()> {
        self.calls.borrow_mut().push(format!("update {range}"));
        self.with_grid(range, |grid| *grid = values.to_vec())
    }

    fn values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        self.with_grid(range, |grid| grid.clone())
    }
}
