//! Unauthenticated CSV export of the remote spreadsheet.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{info, instrument, warn};

use crate::error::{KbError, Result};
use crate::model::{Table, TableSet};
use crate::source::{Backend, TableSource};

const EXPORT_BASE: &str = "https://docs.google.com/spreadsheets/d";

/// Read-only view of a shared spreadsheet through its CSV export endpoint.
pub struct SheetsExport {
    client: Client,
    spreadsheet_id: String,
    lakes_sheet: String,
    reports_sheet: String,
}

impl SheetsExport {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        lakes_sheet: impl Into<String>,
        reports_sheet: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
            lakes_sheet: lakes_sheet.into(),
            reports_sheet: reports_sheet.into(),
        })
    }

    /// Export URL of one sheet, without the query string.
    pub fn endpoint(&self) -> String {
        format!("{EXPORT_BASE}/{}/gviz/tq", self.spreadsheet_id)
    }

    #[instrument(level = "debug", skip(self))]
    fn fetch_sheet(&self, sheet: &str) -> Result<Table> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("tqx", "out:csv"), ("sheet", sheet)])
            .send()
            .map_err(|err| KbError::SourceUnavailable(format!("request for sheet '{sheet}' failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KbError::SourceUnavailable(format!(
                "sheet '{sheet}' export returned {status}"
            )));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .map_err(|err| KbError::SourceUnavailable(format!("sheet '{sheet}' body unreadable: {err}")))?;
        parse_export(content_type.as_deref(), &body)
            .map_err(|err| KbError::SourceUnavailable(format!("sheet '{sheet}': {err}")))
    }
}

impl TableSource for SheetsExport {
    fn backend(&self) -> Backend {
        Backend::SheetsExport
    }

    fn identity(&self) -> String {
        format!("sheets-export:{}", self.spreadsheet_id)
    }

    /// Fetches both sheets. A Reports failure alone degrades to an empty table.
    #[instrument(level = "info", skip_all, fields(spreadsheet = %self.spreadsheet_id))]
    fn fetch(&self) -> Result<TableSet> {
        let lakes = self.fetch_sheet(&self.lakes_sheet)?;
        let reports = match self.fetch_sheet(&self.reports_sheet) {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "reports sheet unavailable, continuing without it");
                Table::default()
            }
        };
        info!(
            lakes = lakes.rows.len(),
            reports = reports.rows.len(),
            "fetched spreadsheet export"
        );
        Ok(TableSet::new(lakes, reports))
    }
}

/// Parses an export response body, rejecting anything that is not CSV.
///
/// A sheet that is not shared publicly answers with a sign-in HTML page and
/// a success status, so both the content type and the body are checked.
pub fn parse_export(content_type: Option<&str>, body: &str) -> Result<Table> {
    if let Some(kind) = content_type {
        if !kind.to_ascii_lowercase().contains("csv") {
            return Err(KbError::SourceUnavailable(format!("export returned '{kind}' instead of CSV")));
        }
    }
    if body.trim_start().starts_with('<') {
        return Err(KbError::SourceUnavailable("export returned markup instead of CSV".into()));
    }
    parse_csv(body)
}

/// Parses CSV text whose first record is the header row.
pub fn parse_csv(body: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(Table::from_grid(grid))
}
