//! Backends the two tables can be read from and written to.

use std::fmt;

use crate::error::Result;
use crate::model::TableSet;

/// Persistence mechanism that served a read or accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Authenticated spreadsheet API (read-write).
    SheetsApi,
    /// Unauthenticated CSV export of the spreadsheet (read-only).
    SheetsExport,
    /// Two-sheet workbook on the local disk.
    Local,
}

impl Backend {
    pub fn is_remote(self) -> bool {
        !matches!(self, Backend::Local)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::SheetsApi => write!(f, "google-sheets-api"),
            Backend::SheetsExport => write!(f, "google-sheets-export"),
            Backend::Local => write!(f, "local-workbook"),
        }
    }
}

/// Something the Lakes and Reports tables can be fetched from.
pub trait TableSource {
    fn backend(&self) -> Backend;

    /// Stable key identifying this source, used to scope cached results.
    fn identity(&self) -> String;

    fn fetch(&self) -> Result<TableSet>;
}

/// Something the Lakes and Reports tables can be persisted to.
///
/// Implementations overwrite whatever the backend held before.
pub trait TableSink {
    fn backend(&self) -> Backend;

    fn store(&self, tables: &TableSet) -> Result<()>;
}
