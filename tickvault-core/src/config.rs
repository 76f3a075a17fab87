//! Process configuration loaded from TOML, plus vendor credentials from the
//! environment.

use crate::error::ConfigError;
use crate::fetch::retry::RetryPolicy;
use crate::vendor::VendorKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Destination for archives and metadata snapshots. Archival is skipped
    /// when unset.
    pub output_dir: Option<PathBuf>,
    pub universe_file: PathBuf,
    pub retry: RetryConfig,
    pub http: HttpConfig,
    pub normalize: NormalizeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            universe_file: PathBuf::from("config/universe.toml"),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            normalize: NormalizeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_tries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total time budget for one request, connect through body.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Worker threads for normalization; 0 means one per CPU.
    pub workers: usize,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_tries == 0 {
            return Err(ConfigError::InvalidValue("retry.max_tries must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::InvalidValue(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "http.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_tries,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}

/// Vendor API key read from the environment.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Environment variable holding the key for `kind`.
    pub fn env_var(kind: VendorKind) -> &'static str {
        match kind {
            VendorKind::Eodhd => "EODHISTORICALDATA",
            VendorKind::Polygon => "POLYGON",
        }
    }

    pub fn from_env(kind: VendorKind) -> Result<Self, ConfigError> {
        let var = Self::env_var(kind);
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(ConfigError::MissingCredential { var }),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"<redacted>").finish()
    }
}
