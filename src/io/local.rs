use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::error::{KbError, Result};
use crate::io::{excel_read, excel_write};
use crate::model::TableSet;
use crate::source::{Backend, TableSink, TableSource};

/// Two-sheet workbook on the local disk, used as the fallback backend.
#[derive(Debug, Clone)]
pub struct LocalWorkbook {
    path: PathBuf,
}

impl LocalWorkbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the workbook with canonical headers when it does not exist.
    ///
    /// Returns `true` when a file was created.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        warn!("local workbook missing, creating one with default headers");
        self.store(&TableSet::canonical())?;
        Ok(true)
    }

    /// Copies an existing workbook over the local one.
    pub fn import_from(&self, source: &Path) -> Result<()> {
        // Parse first so a broken upload never replaces a readable file.
        excel_read::read_tables(source)?;
        self.create_parent_dir()?;
        fs::copy(source, &self.path).map_err(|err| self.write_error(&err))?;
        Ok(())
    }

    fn create_parent_dir(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|err| self.write_error(&err))
            }
            _ => Ok(()),
        }
    }

    fn write_error(&self, err: &dyn std::fmt::Display) -> KbError {
        KbError::LocalWrite {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }
}

impl TableSource for LocalWorkbook {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn identity(&self) -> String {
        format!("local:{}", self.path.display())
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    fn fetch(&self) -> Result<TableSet> {
        self.ensure_exists()?;
        let tables = excel_read::read_tables(&self.path)?;
        info!(
            lakes = tables.lakes.rows.len(),
            reports = tables.reports.rows.len(),
            "read local workbook"
        );
        Ok(tables)
    }
}

impl TableSink for LocalWorkbook {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    fn store(&self, tables: &TableSet) -> Result<()> {
        self.create_parent_dir()?;
        excel_write::write_tables(&self.path, tables).map_err(|err| match err {
            KbError::ExcelWrite(rust_xlsxwriter::XlsxError::IoError(io))
                if io.kind() == ErrorKind::PermissionDenied =>
            {
                KbError::LocalWrite {
                    path: self.path.clone(),
                    reason: format!("permission denied ({io}); the file may be open in another program"),
                }
            }
            other => self.write_error(&other),
        })?;
        info!(
            lakes = tables.lakes.rows.len(),
            reports = tables.reports.rows.len(),
            "local workbook saved"
        );
        Ok(())
    }
}
