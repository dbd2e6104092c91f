//! Runtime settings: defaults, an optional TOML file, then `KB__*` variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{KbError, Result};
use crate::io::credentials::{CredentialLocator, Secrets};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "lakehouse-kb.toml";

/// Shared spreadsheet holding the team's tables.
pub const DEFAULT_SPREADSHEET_ID: &str = "19Ge1PiHdeWt0mofW5YkxmectUchGcbclaHNim_XvmFM";

const ENV_PREFIX: &str = "KB__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub spreadsheet_id: String,
    pub lakes_sheet: String,
    pub reports_sheet: String,
    pub local_path: PathBuf,
    /// Explicit credential file, searched before the conventional locations.
    pub credentials_path: Option<PathBuf>,
    /// TOML secret store holding a `service_account` entry.
    pub secrets_path: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    /// When false only the local workbook is used.
    pub remote_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.into(),
            lakes_sheet: "Lakes".into(),
            reports_sheet: "Reports".into(),
            local_path: default_local_path(),
            credentials_path: None,
            secrets_path: None,
            cache_ttl_secs: 300,
            request_timeout_secs: 30,
            remote_enabled: true,
        }
    }
}

/// `<local data dir>/StreamlitData/LakeHouse.xlsx`, or the working
/// directory when the platform has no such directory.
pub fn default_local_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("StreamlitData"))
        .unwrap_or_default()
        .join("LakeHouse.xlsx")
}

impl Settings {
    /// Loads settings from `path` (or [`DEFAULT_CONFIG_FILE`] if present)
    /// and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "reading settings file");
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Applies `KB__<FIELD>` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("SPREADSHEET_ID") {
            self.spreadsheet_id = v;
        }
        if let Some(v) = var("LAKES_SHEET") {
            self.lakes_sheet = v;
        }
        if let Some(v) = var("REPORTS_SHEET") {
            self.reports_sheet = v;
        }
        if let Some(v) = var("LOCAL_PATH") {
            self.local_path = PathBuf::from(v);
        }
        if let Some(v) = var("CREDENTIALS_PATH") {
            self.credentials_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("SECRETS_PATH") {
            self.secrets_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_number("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("REMOTE_ENABLED") {
            self.remote_enabled = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Secret store from `secrets_path`, else from the environment.
    pub fn secrets(&self) -> Result<Secrets> {
        match &self.secrets_path {
            Some(path) => Secrets::from_toml_file(path),
            None => Ok(Secrets::from_env()),
        }
    }

    pub fn credential_locator(&self) -> Result<CredentialLocator> {
        Ok(CredentialLocator::with_default_files(
            self.secrets()?,
            self.credentials_path.clone(),
        ))
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| KbError::Config(format!("{ENV_PREFIX}{name} must be a whole number, got '{raw}'")))
}
