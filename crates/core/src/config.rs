//! Configuration management for blobcdn
//!
//! Storage credentials come from the process environment (a `.env` file in the
//! working directory is honoured). An optional TOML file may provide the same
//! values plus upload tuning; environment values always win.

use crate::error::{Error, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration directory name
const CONFIG_DIR: &str = "blobcdn";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

pub const ENV_ACCOUNT_NAME: &str = "ACCOUNT_NAME";
pub const ENV_ACCOUNT_KEY: &str = "ACCOUNT_KEY";
pub const ENV_ACCOUNT_URL: &str = "ACCOUNT_URL";

/// Main configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub upload: UploadSettings,
}

/// `[storage]` table of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_url: Option<String>,
}

/// Upload tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Validity of each generated access signature
    #[serde(default = "default_sas_lifetime")]
    pub sas_lifetime_minutes: i64,
    /// How long a signature is reused before a fresh one is generated
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: i64,
    /// Re-upload attempts when the uploaded blob fails image verification
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            sas_lifetime_minutes: default_sas_lifetime(),
            refresh_interval_minutes: default_refresh_interval(),
            max_retry: default_max_retry(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_sas_lifetime() -> i64 {
    120
}

fn default_refresh_interval() -> i64 {
    1
}

fn default_max_retry() -> u32 {
    4
}

fn default_timeout() -> u64 {
    30
}

/// Resolved storage account settings
#[derive(Clone)]
pub struct StorageConfig {
    pub account_name: String,
    /// Base64 encoded account access key
    pub account_key: String,
    /// Blob service root, e.g. `https://myaccount.blob.core.windows.net`
    pub account_url: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("account_url", &self.account_url)
            .finish()
    }
}

impl StorageConfig {
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        account_url: Option<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            account_url,
        }
    }

    /// Load from `.env` and the process environment, falling back to the file section.
    pub fn load(section: &StorageSection) -> Result<Self> {
        // A missing .env file is the normal case
        let _ = dotenvy::dotenv();
        Self::resolve_with(section, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit variable lookup.
    ///
    /// Missing account name or key is fatal here. A missing account url is
    /// reported later, the first time a signature or URL needs it.
    pub fn resolve_with<F>(section: &StorageSection, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, fallback: &Option<String>| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone().filter(|v| !v.trim().is_empty()))
        };

        let account_name =
            pick(ENV_ACCOUNT_NAME, &section.account_name).ok_or(Error::MissingEnv(ENV_ACCOUNT_NAME))?;
        let account_key =
            pick(ENV_ACCOUNT_KEY, &section.account_key).ok_or(Error::MissingEnv(ENV_ACCOUNT_KEY))?;
        let account_url = pick(ENV_ACCOUNT_URL, &section.account_url);

        Ok(Self::new(account_name, account_key, account_url))
    }

    /// Service root without a trailing slash
    pub fn service_root(&self) -> Result<&str> {
        self.account_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or(Error::MissingEnv(ENV_ACCOUNT_URL))
    }
}

/// Default configuration file path (`~/.config/blobcdn/config.toml`)
pub fn get_config_path() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load configuration.
///
/// An explicit path must exist. Without one, the default location is used if
/// present and defaults apply otherwise.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    let config_path = match path {
        Some(p) if !p.exists() => {
            return Err(Error::Config(format!(
                "Configuration file not found: {}",
                p.display()
            )))
        }
        Some(p) => p.to_path_buf(),
        None => match get_config_path() {
            Ok(p) if p.exists() => p,
            _ => return Ok(ConfigFile::default()),
        },
    };

    let content = fs::read_to_string(&config_path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read config file: {}", e))
    })?;

    parse_config(&content)
}

/// Parse configuration file content
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    validate_settings(&config.upload)?;
    Ok(config)
}

/// Validate upload settings
pub fn validate_settings(settings: &UploadSettings) -> Result<()> {
    if settings.sas_lifetime_minutes <= 0 {
        return Err(Error::InvalidInput(
            "sas_lifetime_minutes must be positive".to_string(),
        ));
    }

    if settings.refresh_interval_minutes < 0
        || settings.refresh_interval_minutes > settings.sas_lifetime_minutes
    {
        return Err(Error::InvalidInput(format!(
            "refresh_interval_minutes must be between 0 and {}",
            settings.sas_lifetime_minutes
        )));
    }

    if settings.timeout_secs == 0 {
        return Err(Error::InvalidInput("timeout_secs cannot be 0".to_string()));
    }

    Ok(())
}
