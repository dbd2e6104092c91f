//! Whole-table persistence with remote-first, local-fallback semantics.

use tracing::{info, instrument, warn};

use crate::error::{KbError, Result};
use crate::model::{Table, TableSet};
use crate::source::{Backend, TableSink};

/// Writes edited tables to the remote backend, falling back to the local one.
pub struct Writer {
    remote: Option<Box<dyn TableSink>>,
    local: Box<dyn TableSink>,
}

impl Writer {
    pub fn new(remote: Box<dyn TableSink>, local: Box<dyn TableSink>) -> Self {
        Self {
            remote: Some(remote),
            local,
        }
    }

    /// Writer that only ever persists locally.
    pub fn local_only(local: Box<dyn TableSink>) -> Self {
        Self { remote: None, local }
    }

    /// Persists `table` as the Lakes sheet together with its `sibling` Reports
    /// sheet and returns the backend that accepted the write.
    ///
    /// Any remote failure triggers a full overwrite of the local workbook.
    /// When that fails too, [`KbError::WriteFailed`] carries both causes.
    /// Callers must invalidate their load cache after a successful write.
    #[instrument(level = "info", skip_all, fields(rows = table.rows.len(), cols = table.width()))]
    pub fn write(&self, table: &Table, sibling: &Table) -> Result<Backend> {
        let tables = TableSet::new(table.clone(), sibling.clone());
        self.write_set(&tables)
    }

    pub fn write_set(&self, tables: &TableSet) -> Result<Backend> {
        let remote_error = match &self.remote {
            Some(remote) => match remote.store(tables) {
                Ok(()) => {
                    info!(backend = %remote.backend(), "write committed");
                    return Ok(remote.backend());
                }
                Err(error) => {
                    warn!(%error, "remote write failed, falling back to local workbook");
                    error
                }
            },
            None => KbError::Config("remote backend disabled".into()),
        };

        match self.local.store(tables) {
            Ok(()) => {
                info!(backend = %self.local.backend(), "write committed");
                Ok(self.local.backend())
            }
            Err(local_error) => Err(KbError::WriteFailed {
                remote: Box::new(remote_error),
                local: Box::new(local_error),
            }),
        }
    }
}
