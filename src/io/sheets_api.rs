//! Authenticated read-write access to the remote spreadsheet.
//!
//! [`SheetsBackend`] holds the overwrite logic and talks to the service
//! through the [`SheetsClient`] trait; [`HttpSheetsClient`] is the Google
//! Sheets v4 implementation and [`SheetsApi`] wires credential lookup and
//! client construction together on every call.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::error::{KbError, Result};
use crate::io::credentials::{CredentialLocator, ServiceAccountKey};
use crate::model::{Table, TableKind, TableSet};
use crate::source::{Backend, TableSink, TableSource};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// OAuth scopes requested for the service account.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const TOKEN_LIFETIME_SECS: i64 = 3600;
const MIN_ROWS: usize = 1000;
const MIN_COLS: usize = 20;

/// Spreadsheet-style column name for a 1-based column number.
///
/// `1` is `A`, `26` is `Z`, `27` is `AA`, `53` is `BA`.
pub fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// A1 reference of a 1-based (row, column) cell.
pub fn a1_cell(row: usize, col: usize) -> String {
    format!("{}{row}", column_letters(col.max(1)))
}

/// Sheet name quoted for use inside an A1 range.
pub fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Range covering `rows` × `cols` cells from `A1` on `sheet`.
pub fn full_range(sheet: &str, rows: usize, cols: usize) -> String {
    format!("{}!A1:{}", quote_sheet(sheet), a1_cell(rows.max(1), cols.max(1)))
}

/// Title and grid size of one sheet in the remote spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub sheet_id: i64,
    pub title: String,
    pub row_count: usize,
    pub column_count: usize,
}

/// Operations the backend needs from the spreadsheet service.
pub trait SheetsClient {
    fn sheets(&self) -> Result<Vec<SheetInfo>>;

    fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()>;

    fn resize_sheet(&self, sheet_id: i64, rows: usize, cols: usize) -> Result<()>;

    fn clear(&self, range: &str) -> Result<()>;

    /// Overwrites `range` with `values`, stored verbatim (no formula parsing).
    fn update(&self, range: &str, values: &[Vec<String>]) -> Result<()>;

    fn values(&self, range: &str) -> Result<Vec<Vec<String>>>;
}

/// Sheet-level overwrite logic on top of any [`SheetsClient`].
pub struct SheetsBackend<C> {
    client: C,
    lakes_sheet: String,
    reports_sheet: String,
}

impl<C: SheetsClient> SheetsBackend<C> {
    pub fn new(client: C, lakes_sheet: impl Into<String>, reports_sheet: impl Into<String>) -> Self {
        Self {
            client,
            lakes_sheet: lakes_sheet.into(),
            reports_sheet: reports_sheet.into(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Replaces the contents of `sheet` with `table`, creating the sheet if needed.
    #[instrument(level = "debug", skip(self, table), fields(rows = table.rows.len(), cols = table.width()))]
    pub fn overwrite_sheet(&self, sheet: &str, table: &Table) -> Result<()> {
        let rows_needed = (table.rows.len() + 10).max(MIN_ROWS);
        let cols_needed = (table.width() + 2).max(MIN_COLS);

        match self.client.sheets()?.into_iter().find(|info| info.title == sheet) {
            None => {
                debug!(sheet, "creating missing sheet");
                self.client.add_sheet(sheet, rows_needed, cols_needed)?;
            }
            Some(info) if info.row_count <= table.rows.len() || info.column_count < table.width() => {
                debug!(sheet, "growing sheet grid");
                self.client.resize_sheet(
                    info.sheet_id,
                    info.row_count.max(rows_needed),
                    info.column_count.max(cols_needed),
                )?;
            }
            Some(_) => {}
        }

        self.client.clear(&quote_sheet(sheet))?;
        if table.columns.is_empty() {
            return Ok(());
        }

        let values = table.to_grid();
        let range = full_range(sheet, values.len(), table.width());
        self.client.update(&range, &values)
    }

    /// Reads the sheet named `preferred`, else the one `kind` would select.
    fn read_kind(&self, sheets: &[String], preferred: &str, kind: TableKind) -> Result<Table> {
        let idx = sheets.iter().position(|title| title == preferred);
        let Some(idx) = idx.or_else(|| kind.select_sheet(sheets)) else {
            return Ok(Table::default());
        };
        let grid = self.client.values(&quote_sheet(&sheets[idx]))?;
        Ok(Table::from_grid(grid))
    }
}

impl<C: SheetsClient> TableSource for SheetsBackend<C> {
    fn backend(&self) -> Backend {
        Backend::SheetsApi
    }

    fn identity(&self) -> String {
        format!("sheets-api:{}:{}", self.lakes_sheet, self.reports_sheet)
    }

    fn fetch(&self) -> Result<TableSet> {
        let titles: Vec<String> = self.client.sheets()?.into_iter().map(|info| info.title).collect();
        let lakes = self.read_kind(&titles, &self.lakes_sheet, TableKind::Lakes)?;
        let reports = self.read_kind(&titles, &self.reports_sheet, TableKind::Reports)?;
        Ok(TableSet::new(lakes, reports))
    }
}

impl<C: SheetsClient> TableSink for SheetsBackend<C> {
    fn backend(&self) -> Backend {
        Backend::SheetsApi
    }

    /// Writes Lakes, then Reports when it carries any columns.
    fn store(&self, tables: &TableSet) -> Result<()> {
        self.overwrite_sheet(&self.lakes_sheet, &tables.lakes)?;
        if !tables.reports.columns.is_empty() {
            self.overwrite_sheet(&self.reports_sheet, &tables.reports)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Signs the JWT bearer assertion exchanged for an access token.
pub fn sign_assertion(key: &ServiceAccountKey, issued_at: i64) -> Result<String> {
    let claims = Claims {
        iss: &key.client_email,
        scope: SCOPES.join(" "),
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + TOKEN_LIFETIME_SECS,
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|err| KbError::InvalidCredentials(format!("private_key is not an RSA PEM key: {err}")))?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?)
}

/// Google Sheets v4 client authorised with a service-account access token.
pub struct HttpSheetsClient {
    client: Client,
    spreadsheet_id: String,
    token: String,
}

impl HttpSheetsClient {
    /// Exchanges the service-account key for an access token.
    #[instrument(level = "info", skip_all, fields(client_email = %key.client_email))]
    pub fn connect(key: &ServiceAccountKey, spreadsheet_id: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let assertion = sign_assertion(key, Utc::now().timestamp())?;
        let response = client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()?;
        let token: TokenResponse = check(response)?.json()?;
        info!("service account authorised");
        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.access_token,
        })
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(API_BASE).map_err(|err| KbError::Config(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| KbError::Config(format!("'{API_BASE}' cannot carry a path")))?
            .extend(tail);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        check(request.bearer_auth(&self.token).send()?)
    }

    fn batch_update(&self, request: Value) -> Result<()> {
        let url = self.url(&[format!("{}:batchUpdate", self.spreadsheet_id).as_str()])?;
        self.send(self.client.post(url).json(&json!({ "requests": [request] })))?;
        Ok(())
    }
}

impl SheetsClient for HttpSheetsClient {
    fn sheets(&self) -> Result<Vec<SheetInfo>> {
        let mut url = self.url(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let body: SpreadsheetResponse = self.send(self.client.get(url))?.json()?;
        Ok(body
            .sheets
            .into_iter()
            .map(|sheet| SheetInfo {
                sheet_id: sheet.properties.sheet_id,
                title: sheet.properties.title,
                row_count: sheet.properties.grid_properties.row_count,
                column_count: sheet.properties.grid_properties.column_count,
            })
            .collect())
    }

    fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()> {
        self.batch_update(json!({
            "addSheet": {
                "properties": {
                    "title": title,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                }
            }
        }))
    }

    fn resize_sheet(&self, sheet_id: i64, rows: usize, cols: usize) -> Result<()> {
        self.batch_update(json!({
            "updateSheetProperties": {
                "properties": {
                    "sheetId": sheet_id,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                },
                "fields": "gridProperties(rowCount,columnCount)"
            }
        }))
    }

    fn clear(&self, range: &str) -> Result<()> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", format!("{range}:clear").as_str()])?;
        self.send(self.client.post(url).json(&json!({})))?;
        Ok(())
    }

    fn update(&self, range: &str, values: &[Vec<String>]) -> Result<()> {
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
        self.send(self.client.put(url).json(&body))?;
        Ok(())
    }

    fn values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        let body: ValueRange = self.send(self.client.get(url))?.json()?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(value_to_cell).collect())
            .collect())
    }
}

/// Turns non-success responses into [`KbError::RemoteApi`].
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.pointer("/error_description"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    Err(KbError::RemoteApi {
        status: status.as_u16(),
        message,
    })
}

fn value_to_cell(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: usize,
    #[serde(default)]
    column_count: usize,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Read-write remote backend that authenticates on every call.
///
/// Credential lookup happens lazily so a missing key surfaces as
/// [`KbError::CredentialsNotFound`] at write time and the caller can fall
/// back.
pub struct SheetsApi {
    credentials: CredentialLocator,
    spreadsheet_id: String,
    lakes_sheet: String,
    reports_sheet: String,
    timeout: Duration,
}

impl SheetsApi {
    pub fn new(
        credentials: CredentialLocator,
        spreadsheet_id: impl Into<String>,
        lakes_sheet: impl Into<String>,
        reports_sheet: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            spreadsheet_id: spreadsheet_id.into(),
            lakes_sheet: lakes_sheet.into(),
            reports_sheet: reports_sheet.into(),
            timeout,
        }
    }

    fn connect(&self) -> Result<SheetsBackend<HttpSheetsClient>> {
        let key = self.credentials.resolve()?;
        let client = HttpSheetsClient::connect(&key, &self.spreadsheet_id, self.timeout)?;
        Ok(SheetsBackend::new(
            client,
            self.lakes_sheet.clone(),
            self.reports_sheet.clone(),
        ))
    }
}

impl TableSource for SheetsApi {
    fn backend(&self) -> Backend {
        Backend::SheetsApi
    }

    fn identity(&self) -> String {
        format!("sheets-api:{}", self.spreadsheet_id)
    }

    #[instrument(level = "info", skip_all, fields(spreadsheet = %self.spreadsheet_id))]
    fn fetch(&self) -> Result<TableSet> {
        self.connect()?.fetch()
    }
}

impl TableSink for SheetsApi {
    fn backend(&self) -> Backend {
        Backend::SheetsApi
    }

    #[instrument(level = "info", skip_all, fields(spreadsheet = %self.spreadsheet_id))]
    fn store(&self, tables: &TableSet) -> Result<()> {
        self.connect()?.store(tables)?;
        info!(
            lakes = tables.lakes.rows.len(),
            reports = tables.reports.rows.len(),
            "spreadsheet updated"
        );
        Ok(())
    }
}
