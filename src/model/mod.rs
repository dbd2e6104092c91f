//! In-memory representation of the two knowledge-base tables.
//!
//! Tables are kept as plain string grids, mirroring what both the
//! spreadsheet service and the local workbook store. Typed entries are views
//! built on demand by resolving header names through ordered candidate lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod columns;

pub use columns::{TableKind, resolve_column};

/// A sheet's contents: a header row plus data rows of string cells.
///
/// Missing values are stored as empty strings. Rows are identified by their
/// position only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table with the provided headers and no rows.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from a grid whose first row holds the headers.
    ///
    /// Rows are padded or truncated to the header width and rows with no
    /// non-blank cell are dropped.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut grid = grid.into_iter();
        let columns = match grid.next() {
            Some(header) => header.into_iter().map(|cell| cell.trim().to_string()).collect(),
            None => return Self::default(),
        };
        let mut table = Self {
            columns,
            rows: Vec::new(),
        };
        for row in grid {
            table.push_row(row);
        }
        table
    }

    /// Returns the header row followed by every data row.
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.columns.clone());
        grid.extend(self.rows.iter().cloned());
        grid
    }

    /// Appends a row padded to the header width. All-blank rows are ignored.
    ///
    /// A row wider than the header grows the header with blank names so no
    /// cell is dropped.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            return;
        }
        if row.len() > self.columns.len() {
            warn!(
                header = self.columns.len(),
                row = row.len(),
                "row wider than header, adding unnamed columns"
            );
            self.columns.resize(row.len(), String::new());
            let width = self.columns.len();
            for existing in &mut self.rows {
                existing.resize(width, String::new());
            }
        }
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of the header named exactly `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cell at (`row`, `col`), treating anything out of range as blank.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Non-blank values of a column in row order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(col))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
    }

    /// Distinct entity names of the table, first-seen order.
    ///
    /// The name column comes from the candidate headers for `kind`, falling
    /// back to the first column.
    pub fn entity_names(&self, kind: TableKind) -> Vec<String> {
        if self.columns.is_empty() {
            return Vec::new();
        }
        let col = resolve_column(&self.columns, kind.name_candidates()).unwrap_or(0);
        unique_in_order(self.column_values(col))
    }

    /// Typed view over the Lakes table. Rows without a lake name are skipped.
    pub fn lake_entries(&self) -> Vec<LakeEntry> {
        self.lake_entries_matching(|_| true)
    }

    /// Typed view over the Lakes rows accepted by `keep`.
    pub fn lake_entries_matching(&self, mut keep: impl FnMut(&[String]) -> bool) -> Vec<LakeEntry> {
        let layout = LakeLayout::resolve(&self.columns);
        self.rows
            .iter()
            .filter(|row| keep(row))
            .filter_map(|row| layout.entry(&self.columns, row))
            .collect()
    }

    /// Typed view over the Reports table. Rows without a name are skipped.
    pub fn report_entries(&self) -> Vec<ReportEntry> {
        let layout = ReportLayout::resolve(&self.columns);
        self.rows
            .iter()
            .filter_map(|row| layout.entry(&self.columns, row))
            .collect()
    }
}

/// Both tables of the knowledge base as loaded from, or written to, a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSet {
    pub lakes: Table,
    pub reports: Table,
}

impl TableSet {
    pub fn new(lakes: Table, reports: Table) -> Self {
        Self { lakes, reports }
    }

    /// Tables holding the canonical headers and no rows.
    pub fn canonical() -> Self {
        Self {
            lakes: Table::with_columns(columns::LAKE_HEADERS),
            reports: Table::with_columns(columns::REPORT_HEADERS),
        }
    }
}

/// One row of the Lakes table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LakeEntry {
    pub lake_name: String,
    pub folder: Option<String>,
    pub element: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub change_notes: Option<String>,
    /// Columns without a dedicated field, keyed by header.
    pub extra: BTreeMap<String, String>,
}

impl LakeEntry {
    pub fn new(lake_name: impl Into<String>) -> Self {
        Self {
            lake_name: lake_name.into(),
            ..Self::default()
        }
    }

    /// Renders the entry as a row matching `columns`.
    ///
    /// Headers resolve the same way they do on read; unknown headers are
    /// looked up in `extra`.
    pub fn to_row(&self, columns: &[String]) -> Vec<String> {
        let layout = LakeLayout::resolve(columns);
        columns
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let field = match Some(idx) {
                    i if i == layout.name => Some(&self.lake_name),
                    i if i == layout.folder => self.folder.as_ref(),
                    i if i == layout.element => self.element.as_ref(),
                    i if i == layout.url => self.url.as_ref(),
                    i if i == layout.description => self.description.as_ref(),
                    i if i == layout.change_notes => self.change_notes.as_ref(),
                    _ => self.extra.get(header),
                };
                field.cloned().unwrap_or_default()
            })
            .collect()
    }
}

/// One row of the Reports table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub workspace: Option<String>,
    pub owner: Option<String>,
    pub update_freq: Option<String>,
    pub lake: Option<String>,
    pub status: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// Column positions of the Lakes fields; the name falls back to column 0.
pub(crate) struct LakeLayout {
    pub(crate) name: Option<usize>,
    pub(crate) folder: Option<usize>,
    pub(crate) element: Option<usize>,
    pub(crate) url: Option<usize>,
    pub(crate) description: Option<usize>,
    pub(crate) change_notes: Option<usize>,
}

impl LakeLayout {
    pub(crate) fn resolve(columns: &[String]) -> Self {
        let name = resolve_column(columns, TableKind::Lakes.name_candidates())
            .or(if columns.is_empty() { None } else { Some(0) });
        Self {
            name,
            folder: resolve_column(columns, columns::FOLDER_CANDIDATES),
            element: resolve_column(columns, columns::ELEMENT_CANDIDATES),
            url: resolve_column(columns, columns::URL_CANDIDATES),
            description: resolve_column(columns, columns::DESCRIPTION_CANDIDATES),
            change_notes: resolve_column(columns, columns::CHANGE_NOTES_CANDIDATES),
        }
    }

    fn entry(&self, columns: &[String], row: &[String]) -> Option<LakeEntry> {
        let lake_name = field(row, self.name)?;
        let known = [
            self.name,
            self.folder,
            self.element,
            self.url,
            self.description,
            self.change_notes,
        ];
        Some(LakeEntry {
            lake_name,
            folder: field(row, self.folder),
            element: field(row, self.element),
            url: field(row, self.url),
            description: field(row, self.description),
            change_notes: field(row, self.change_notes),
            extra: extra_fields(columns, row, &known),
        })
    }
}

struct ReportLayout {
    name: Option<usize>,
    workspace: Option<usize>,
    owner: Option<usize>,
    update_freq: Option<usize>,
    lake: Option<usize>,
    status: Option<usize>,
}

impl ReportLayout {
    fn resolve(columns: &[String]) -> Self {
        let name = resolve_column(columns, TableKind::Reports.name_candidates())
            .or(if columns.is_empty() { None } else { Some(0) });
        Self {
            name,
            workspace: resolve_column(columns, columns::WORKSPACE_CANDIDATES),
            owner: resolve_column(columns, columns::OWNER_CANDIDATES),
            update_freq: resolve_column(columns, columns::UPDATE_FREQ_CANDIDATES),
            lake: resolve_column(columns, columns::REPORT_LAKE_CANDIDATES),
            status: resolve_column(columns, columns::STATUS_CANDIDATES),
        }
    }

    fn entry(&self, columns: &[String], row: &[String]) -> Option<ReportEntry> {
        let name = field(row, self.name)?;
        let known = [
            self.name,
            self.workspace,
            self.owner,
            self.update_freq,
            self.lake,
            self.status,
        ];
        Some(ReportEntry {
            name,
            workspace: field(row, self.workspace),
            owner: field(row, self.owner),
            update_freq: field(row, self.update_freq),
            lake: field(row, self.lake),
            status: field(row, self.status),
            extra: extra_fields(columns, row, &known),
        })
    }
}

fn field(row: &[String], col: Option<usize>) -> Option<String> {
    let value = row.get(col?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn extra_fields(columns: &[String], row: &[String], known: &[Option<usize>]) -> BTreeMap<String, String> {
    columns
        .iter()
        .enumerate()
        .filter(|(idx, header)| !header.is_empty() && !known.contains(&Some(*idx)))
        .filter_map(|(idx, header)| field(row, Some(idx)).map(|value| (header.clone(), value)))
        .collect()
}

/// Keeps the first occurrence of every value, preserving order.
pub fn unique_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}
