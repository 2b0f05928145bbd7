//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use fieldops_offline::SyncConfig;

pub const API_URL_ENV: &str = "FIELDOPS_API_URL";
pub const AUTH_TOKEN_ENV: &str = "FIELDOPS_AUTH_TOKEN";
pub const DB_PATH_ENV: &str = "FIELDOPS_DB_PATH";
pub const SYNC_INTERVAL_ENV: &str = "FIELDOPS_SYNC_INTERVAL_MS";
pub const MAX_RETRIES_ENV: &str = "FIELDOPS_MAX_RETRIES";
pub const BACKEND_TIMEOUT_ENV: &str = "FIELDOPS_BACKEND_TIMEOUT_MS";
pub const DEAD_LETTER_CAPACITY_ENV: &str = "FIELDOPS_DEAD_LETTER_CAPACITY";
pub const DEAD_LETTER_PERMANENT_ENV: &str = "FIELDOPS_DEAD_LETTER_PERMANENT";
pub const PROBE_INTERVAL_ENV: &str = "FIELDOPS_PROBE_INTERVAL_MS";

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(15_000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("could not resolve an app data directory; set FIELDOPS_DB_PATH")]
    NoDataDir,
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Host configuration: where the backend lives, where the queue is stored, and sync policy.
#[derive(Debug, Clone)]
pub struct FieldOpsConfig {
    pub api_url: Url,
    pub auth_token: Option<String>,
    pub db_path: PathBuf,
    pub sync: SyncConfig,
    pub probe_interval: Duration,
}

impl FieldOpsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Unset and blank variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = get(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::invalid(API_URL_ENV, e.to_string()))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(API_URL_ENV, "expected an http(s) url"));
        }

        let db_path = match get(DB_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let mut sync = SyncConfig::default();
        if let Some(ms) = positive(SYNC_INTERVAL_ENV, get(SYNC_INTERVAL_ENV))? {
            sync = sync.with_sync_interval(Duration::from_millis(ms));
        }
        if let Some(n) = positive(MAX_RETRIES_ENV, get(MAX_RETRIES_ENV))? {
            let n = u32::try_from(n).map_err(|e| ConfigError::invalid(MAX_RETRIES_ENV, e.to_string()))?;
            sync = sync.with_max_retries(n);
        }
        if let Some(ms) = positive(BACKEND_TIMEOUT_ENV, get(BACKEND_TIMEOUT_ENV))? {
            sync = sync.with_backend_timeout(Duration::from_millis(ms));
        }
        if let Some(n) = positive(DEAD_LETTER_CAPACITY_ENV, get(DEAD_LETTER_CAPACITY_ENV))? {
            let n = usize::try_from(n)
                .map_err(|e| ConfigError::invalid(DEAD_LETTER_CAPACITY_ENV, e.to_string()))?;
            sync = sync.with_dead_letter_capacity(n);
        }
        if let Some(raw) = get(DEAD_LETTER_PERMANENT_ENV) {
            sync = sync.with_dead_letter_permanent(parse_bool(DEAD_LETTER_PERMANENT_ENV, &raw)?);
        }

        let probe_interval = positive(PROBE_INTERVAL_ENV, get(PROBE_INTERVAL_ENV))?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROBE_INTERVAL);

        Ok(Self {
            api_url,
            auth_token: get(AUTH_TOKEN_ENV),
            db_path,
            sync,
            probe_interval,
        })
    }
}

fn positive(var: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(var, "must be greater than zero")),
        Ok(n) => Ok(Some(n)),
        Err(e) => Err(ConfigError::invalid(var, format!("`{raw}`: {e}"))),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, format!("`{raw}` is not a boolean"))),
    }
}

fn default_db_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .ok_or(ConfigError::NoDataDir)?;
    Ok(base.join("fieldops").join("offline.db"))
}
