//! Cached loading of the knowledge-base tables.
//!
//! [`Loader::load`] never fails: backend errors are turned into
//! [`Diagnostic`]s and an empty [`LoadResult`]. Successful fetches are cached
//! per source identity until the TTL lapses or [`Loader::invalidate`] is
//! called.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::error::KbError;
use crate::model::{Table, TableKind, TableSet};
use crate::source::{Backend, TableSource};

/// Default lifetime of a cached load.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A condition worth showing to the user, with a suggested remedy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub backend: Option<Backend>,
    pub message: String,
    pub remedy: Option<&'static str>,
}

impl Diagnostic {
    pub fn new(severity: Severity, backend: Option<Backend>, message: impl Into<String>) -> Self {
        Self {
            severity,
            backend,
            message: message.into(),
            remedy: None,
        }
    }

    pub fn from_error(severity: Severity, backend: Backend, error: &KbError) -> Self {
        Self {
            severity,
            backend: Some(backend),
            message: error.to_string(),
            remedy: error.remedy(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(remedy) = self.remedy {
            write!(f, " (hint: {remedy})")?;
        }
        Ok(())
    }
}

/// Outcome of a load: name lists, both tables, and what happened on the way.
///
/// A failed load has empty name lists and `None` tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub lake_names: Vec<String>,
    pub report_names: Vec<String>,
    pub lakes: Option<Table>,
    pub reports: Option<Table>,
    pub backend: Option<Backend>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    /// Builds a result from fetched tables. Both name lists are deduplicated
    /// in first-seen order.
    pub fn from_tables(backend: Backend, tables: TableSet) -> Self {
        Self {
            lake_names: tables.lakes.entity_names(TableKind::Lakes),
            report_names: tables.reports.entity_names(TableKind::Reports),
            lakes: Some(tables.lakes),
            reports: Some(tables.reports),
            backend: Some(backend),
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
            ..Self::default()
        }
    }

    /// True when a Lakes table with at least one row was loaded.
    pub fn has_lakes(&self) -> bool {
        self.lakes.as_ref().is_some_and(|table| !table.is_empty())
    }

    /// Both tables, empty when the load failed.
    pub fn tables(&self) -> TableSet {
        TableSet::new(
            self.lakes.clone().unwrap_or_default(),
            self.reports.clone().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone)]
struct CachedTables {
    backend: Backend,
    tables: TableSet,
    fetched_at: Instant,
}

/// Time-bounded cache of fetched tables, keyed by source identity.
#[derive(Debug, Clone)]
pub struct TableCache {
    ttl: Duration,
    entries: HashMap<String, CachedTables>,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn get(&self, key: &str) -> Option<&CachedTables> {
        self.entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
    }

    fn put(&mut self, key: String, backend: Backend, tables: TableSet) {
        self.entries.insert(
            key,
            CachedTables {
                backend,
                tables,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drops every cached entry so the next load hits the backend.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads tables from sources through a [`TableCache`].
#[derive(Debug, Clone, Default)]
pub struct Loader {
    cache: TableCache,
}

impl Loader {
    pub fn new(cache: TableCache) -> Self {
        Self { cache }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(TableCache::new(ttl))
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    pub fn invalidate(&mut self) {
        debug!("table cache invalidated");
        self.cache.invalidate();
    }

    /// Loads both tables from `source`, serving from cache while fresh.
    #[instrument(level = "info", skip_all, fields(backend = %source.backend()))]
    pub fn load(&mut self, source: &dyn TableSource) -> LoadResult {
        let key = source.identity();
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return LoadResult::from_tables(hit.backend, hit.tables.clone());
        }

        match source.fetch() {
            Ok(tables) => {
                info!(
                    lakes = tables.lakes.rows.len(),
                    reports = tables.reports.rows.len(),
                    "tables loaded"
                );
                self.cache.put(key, source.backend(), tables.clone());
                LoadResult::from_tables(source.backend(), tables)
            }
            Err(error) => {
                warn!(%error, "load failed");
                LoadResult::failed(Diagnostic::from_error(Severity::Error, source.backend(), &error))
            }
        }
    }

    /// Tries `sources` in order and returns the first result with a non-empty
    /// Lakes table.
    ///
    /// Diagnostics from skipped sources are carried over, followed by an
    /// info note when the result did not come from the first source. When no
    /// source qualifies the last result is returned.
    pub fn load_first(&mut self, sources: &[&dyn TableSource]) -> LoadResult {
        let mut diagnostics = Vec::new();
        let mut last = LoadResult::default();

        for (position, source) in sources.iter().enumerate() {
            let mut result = self.load(*source);
            let more_to_try = position + 1 < sources.len();
            if !result.has_lakes() && result.lakes.is_some() && more_to_try {
                result.diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    Some(source.backend()),
                    "Lakes table is empty, trying the next source",
                ));
            }
            let mut gathered = std::mem::take(&mut diagnostics);
            gathered.append(&mut result.diagnostics);

            if result.has_lakes() {
                if position > 0 {
                    gathered.push(Diagnostic::new(
                        Severity::Info,
                        Some(source.backend()),
                        "served by a fallback source",
                    ));
                }
                result.diagnostics = gathered;
                return result;
            }
            diagnostics = gathered;
            last = result;
        }

        last.diagnostics = diagnostics;
        last
    }
}
