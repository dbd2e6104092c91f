use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, KbError>;

/// Error type covering the failure cases of loading, editing, and persisting
/// the knowledge-base tables.
#[derive(Debug, Error)]
pub enum KbError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors raised while reading or writing delimited text.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Transport-level HTTP failures (DNS, TLS, timeouts, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when the service-account assertion cannot be signed.
    #[error("token signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Raised when a configuration file is not valid TOML.
    #[error("configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The remote export could not be fetched or parsed.
    #[error("remote source unavailable: {0}")]
    SourceUnavailable(String),

    /// No service-account credential was found in the secret store or on disk.
    #[error("service account credentials not found (looked in: {})", format_paths(.searched))]
    CredentialsNotFound { searched: Vec<PathBuf> },

    /// A credential was found but could not be used.
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),

    /// The spreadsheet service answered with a non-success status.
    #[error("spreadsheet API error ({status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// The local workbook could not be written.
    #[error("failed to write local workbook {path}: {reason}")]
    LocalWrite { path: PathBuf, reason: String },

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a required field of a new record is empty.
    #[error("required field '{0}' is empty")]
    MissingField(String),

    /// Raised when a lake asked for by name is not in the Lakes table.
    #[error("lake '{0}' not found")]
    LakeNotFound(String),

    /// Raised when settings are inconsistent or unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Raised when every backend refused the write.
    #[error("write failed on every backend: remote: {remote}; local: {local}")]
    WriteFailed {
        remote: Box<KbError>,
        local: Box<KbError>,
    },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl KbError {
    /// Suggested action for the person in front of the tool, if any.
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            KbError::SourceUnavailable(_) | KbError::Http(_) => {
                Some("check the network connection; the local workbook is used meanwhile")
            }
            KbError::CredentialsNotFound { .. } => Some(
                "put the key under `service_account` in the secret store or save \
                 service_account_credentials.json next to the program or in your home directory",
            ),
            KbError::InvalidCredentials(_) | KbError::Jwt(_) => {
                Some("download a fresh JSON key for the service account")
            }
            KbError::RemoteApi { .. } => Some(
                "share the spreadsheet with the service account's client_email (Editor) \
                 and check the spreadsheet id and sheet names",
            ),
            KbError::LocalWrite { .. } | KbError::ExcelRead(_) => Some(
                "close the file in Excel, wait for OneDrive to finish syncing, then retry",
            ),
            KbError::LakeNotFound(_) => Some("run `lakes` to list the known lake names"),
            KbError::WriteFailed { local, .. } => local.remedy(),
            _ => None,
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "secret store".to_string();
    }
    let mut listed = vec!["secret store".to_string()];
    listed.extend(paths.iter().map(|path| path.display().to_string()));
    listed.join(", ")
}
