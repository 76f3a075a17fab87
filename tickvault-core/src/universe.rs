//! Universe definitions: named, curated ticker lists.
//!
//! Universes live in a TOML file, one table per universe:
//!
//! ```toml
//! [us_etf_core]
//! desc = "Broad US equity ETFs"
//! symbols = ["SPY", "QQQ", "IWM"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A named set of ticker symbols queried as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub name: String,
    pub description: String,
    pub symbols: Vec<String>,
}

impl Universe {
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            symbols,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One `[name]` table of the universe file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UniverseEntry {
    #[serde(default)]
    desc: String,
    symbols: Vec<String>,
}

/// Every universe defined in a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniverseSet {
    entries: BTreeMap<String, UniverseEntry>,
}

impl UniverseSet {
    /// Load universes from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parse universes from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<universe toml>".into(),
            reason: e.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Build the [`Universe`] registered under `name`.
    pub fn get_universe(&self, name: &str) -> Result<Universe, ConfigError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ConfigError::UnknownUniverse(name.to_string()))?;
        Ok(Universe {
            name: name.to_string(),
            description: entry.desc.clone(),
            symbols: entry.symbols.clone(),
        })
    }
}
