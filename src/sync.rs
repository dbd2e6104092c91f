//! Session-level orchestration of loading, editing, and saving.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::error::{KbError, Result};
use crate::io::credentials::CredentialLocator;
use crate::io::{LocalWorkbook, SheetsApi, SheetsExport, csv_export, sheets_export};
use crate::loader::{LoadResult, Loader};
use crate::model::{LakeEntry, Table};
use crate::source::{Backend, TableSource};
use crate::views;
use crate::writer::Writer;

/// One user's view of the knowledge base.
///
/// Reads go through the cached [`Loader`] over the sources in priority
/// order; writes go through the [`Writer`] and invalidate the cache. After
/// a write lands on the local workbook, reads are served from that workbook
/// until [`KnowledgeBase::refresh`] is called, so the user keeps seeing their
/// own latest edit even while the remote side is stale.
pub struct KnowledgeBase {
    sources: Vec<Box<dyn TableSource>>,
    local: Box<dyn TableSource>,
    writer: Writer,
    loader: Loader,
    prefer_local: bool,
}

impl KnowledgeBase {
    /// Assembles a session from explicit parts.
    ///
    /// `sources` are tried in order; `local` is the source that mirrors the
    /// writer's fallback sink.
    pub fn new(
        sources: Vec<Box<dyn TableSource>>,
        local: Box<dyn TableSource>,
        writer: Writer,
        loader: Loader,
    ) -> Self {
        Self {
            sources,
            local,
            writer,
            loader,
            prefer_local: false,
        }
    }

    /// Wires the remote export, the authenticated API and the local workbook
    /// described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let local = LocalWorkbook::new(&settings.local_path);
        let loader = Loader::with_ttl(settings.cache_ttl());

        if !settings.remote_enabled {
            return Ok(Self::new(
                Vec::new(),
                Box::new(local.clone()),
                Writer::local_only(Box::new(local)),
                loader,
            ));
        }

        let export = SheetsExport::new(
            &settings.spreadsheet_id,
            &settings.lakes_sheet,
            &settings.reports_sheet,
            settings.request_timeout(),
        )?;
        let credentials: CredentialLocator = settings.credential_locator()?;
        if !credentials.is_configured() {
            warn!("no service account configured; edits will be saved locally");
        }
        let api = SheetsApi::new(
            credentials,
            &settings.spreadsheet_id,
            &settings.lakes_sheet,
            &settings.reports_sheet,
            settings.request_timeout(),
        );

        Ok(Self::new(
            vec![Box::new(export)],
            Box::new(local.clone()),
            Writer::new(Box::new(api), Box::new(local)),
            loader,
        ))
    }

    /// Loads both tables from the best available source.
    #[instrument(level = "info", skip_all, fields(prefer_local = self.prefer_local))]
    pub fn load(&mut self) -> LoadResult {
        let mut order: Vec<&dyn TableSource> = Vec::with_capacity(self.sources.len() + 1);
        if !self.prefer_local {
            order.extend(self.sources.iter().map(|source| source.as_ref()));
        }
        order.push(self.local.as_ref());
        self.loader.load_first(&order)
    }

    /// Persists an edited Lakes table with its Reports sibling.
    pub fn save(&mut self, lakes: &Table, reports: &Table) -> Result<Backend> {
        let backend = self.writer.write(lakes, reports)?;
        self.loader.invalidate();
        self.prefer_local = !backend.is_remote();
        Ok(backend)
    }

    /// Appends a record to the current Lakes table and saves.
    #[instrument(level = "info", skip_all, fields(lake = %entry.lake_name))]
    pub fn add_lake_entry(&mut self, entry: &LakeEntry) -> Result<Backend> {
        let loaded = self.load();
        if loaded.lakes.is_none() {
            return Err(KbError::SourceUnavailable(
                "no Lakes table could be loaded; refusing to overwrite it with a single record".into(),
            ));
        }
        let current = loaded.tables();
        let lakes = views::append_lake_entry(&current.lakes, entry)?;
        info!(rows = lakes.rows.len(), "record appended");
        self.save(&lakes, &current.reports)
    }

    /// Replaces the Lakes table with the contents of a CSV file and saves.
    pub fn replace_lakes_from_csv(&mut self, path: &Path) -> Result<Backend> {
        let lakes = sheets_export::parse_csv(&std::fs::read_to_string(path)?)?;
        let current = self.load().tables();
        self.save(&lakes, &current.reports)
    }

    /// Writes the current Lakes table to a date-stamped CSV in `dir`.
    pub fn export_lakes(&mut self, dir: &Path) -> Result<PathBuf> {
        let lakes = self.load().lakes.unwrap_or_default();
        csv_export::export_lakes(&lakes, dir, Local::now().date_naive())
    }

    /// Drops cached tables and goes back to remote-first reads.
    pub fn refresh(&mut self) {
        self.prefer_local = false;
        self.loader.invalidate();
    }
}
