//! Adapters for the places the knowledge-base tables live.

pub mod credentials;
pub mod csv_export;
pub mod excel_read;
pub mod excel_write;
pub mod local;
pub mod sheets_api;
pub mod sheets_export;

pub use local::LocalWorkbook;
pub use sheets_api::{SheetsApi, SheetsBackend, SheetsClient};
pub use sheets_export::SheetsExport;
