//! Service-account credential discovery.
//!
//! Credentials come from an injected secret store (key `service_account`,
//! either a JSON string or a structured table) or from a
//! `service_account_credentials.json` file in one of a few known places.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{KbError, Result};

/// Key under which the secret store holds the service-account blob.
pub const SERVICE_ACCOUNT_KEY: &str = "service_account";
/// File name searched next to the executable and in the home directory.
pub const CREDENTIALS_FILE_NAME: &str = "service_account_credentials.json";
/// Environment variable holding a JSON secret, used when no store is configured.
pub const SERVICE_ACCOUNT_ENV: &str = "KB_SERVICE_ACCOUNT";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Subset of a Google service-account key file needed to mint tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parses a key from either a JSON string or an already structured value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let key: Self = match value {
            Value::String(raw) => serde_json::from_str(raw)?,
            other => serde_json::from_value(other.clone())?,
        };
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(KbError::InvalidCredentials(
                "client_email and private_key must be set".into(),
            ));
        }
        Ok(key)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_value(&Value::String(raw))
    }
}

/// Injected secret store, keyed by secret name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secrets {
    entries: BTreeMap<String, Value>,
}

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML secrets file; nested tables become structured values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(raw)?;
        let entries = table
            .into_iter()
            .map(|(key, value)| -> Result<(String, Value)> {
                Ok((key, serde_json::to_value(value)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { entries })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Builds a store from [`SERVICE_ACCOUNT_ENV`] if it is set.
    pub fn from_env() -> Self {
        let mut secrets = Self::new();
        if let Ok(raw) = std::env::var(SERVICE_ACCOUNT_ENV) {
            secrets.insert(SERVICE_ACCOUNT_KEY, Value::String(raw));
        }
        secrets
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Where to look for service-account credentials, in priority order.
#[derive(Debug, Clone, Default)]
pub struct CredentialLocator {
    pub secrets: Secrets,
    pub files: Vec<PathBuf>,
}

impl CredentialLocator {
    pub fn new(secrets: Secrets, files: Vec<PathBuf>) -> Self {
        Self { secrets, files }
    }

    /// Secret store plus the conventional file locations: an explicit
    /// override, the executable's directory, then the home directory.
    pub fn with_default_files(secrets: Secrets, explicit: Option<PathBuf>) -> Self {
        let mut files: Vec<PathBuf> = explicit.into_iter().collect();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            files.push(dir.join(CREDENTIALS_FILE_NAME));
        }
        if let Some(home) = dirs::home_dir() {
            files.push(home.join(CREDENTIALS_FILE_NAME));
        }
        Self { secrets, files }
    }

    /// True when a credential is likely available, without parsing it.
    pub fn is_configured(&self) -> bool {
        self.secrets.contains(SERVICE_ACCOUNT_KEY) || self.files.iter().any(|path| path.is_file())
    }

    /// Resolves the first usable credential.
    ///
    /// The secret store wins over files. A present but malformed credential is
    /// an error rather than a reason to keep searching.
    pub fn resolve(&self) -> Result<ServiceAccountKey> {
        if let Some(value) = self.secrets.get(SERVICE_ACCOUNT_KEY) {
            debug!("using service account from secret store");
            return ServiceAccountKey::from_value(value);
        }
        for path in &self.files {
            if path.is_file() {
                debug!(path = %path.display(), "using service account file");
                return ServiceAccountKey::from_file(path);
            }
        }
        Err(KbError::CredentialsNotFound {
            searched: self.files.clone(),
        })
    }
}
