//! Service configuration with validation.
//!
//! Every path except `data_dir` is relative to `data_dir`.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::ledger::LineFormat;
use crate::presets::DEFAULT_DOCUMENT_TITLE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    InvalidPath { field: &'static str, reason: String },

    #[error("{0} and {1} must not point at the same location")]
    Conflict(&'static str, &'static str),

    #[error("document_title cannot be empty")]
    EmptyTitle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of all persisted state
    pub data_dir: PathBuf,
    /// Append-only transaction log
    pub ledger_file: PathBuf,
    /// Rendered contract documents
    pub contracts_dir: PathBuf,
    /// Rendered receipts
    pub transactions_dir: PathBuf,
    /// Header title on every rendered page
    pub document_title: String,
    pub line_format: LineFormat,
    /// HTTP bind address for the server binary
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            ledger_file: PathBuf::from("transactions.log"),
            contracts_dir: PathBuf::from("contracts"),
            transactions_dir: PathBuf::from("transactions"),
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            line_format: LineFormat::Escaped,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5001),
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_relative("ledger_file", &self.ledger_file)?;
        check_relative("contracts_dir", &self.contracts_dir)?;
        check_relative("transactions_dir", &self.transactions_dir)?;

        let ledger = normalized(&self.ledger_file);
        let contracts = normalized(&self.contracts_dir);
        let transactions = normalized(&self.transactions_dir);
        if ledger == contracts {
            return Err(ConfigError::Conflict("ledger_file", "contracts_dir"));
        }
        if ledger == transactions {
            return Err(ConfigError::Conflict("ledger_file", "transactions_dir"));
        }
        if contracts == transactions {
            return Err(ConfigError::Conflict("contracts_dir", "transactions_dir"));
        }

        if self.document_title.trim().is_empty() {
            return Err(ConfigError::EmptyTitle);
        }

        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    pub fn contracts_path(&self) -> PathBuf {
        self.data_dir.join(&self.contracts_dir)
    }

    pub fn transactions_path(&self) -> PathBuf {
        self.data_dir.join(&self.transactions_dir)
    }
}

/// `./a/./b` and `a/b` name the same entry under data_dir
fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn check_relative(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPath {
        field,
        reason: reason.to_string(),
    };
    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to data_dir"))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.ledger_path(), PathBuf::from("./transactions.log"));
        assert_eq!(config.bind_addr.port(), 5001);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"data_dir": "/srv/novamint", "line_format": "legacy"}"#).unwrap();
        assert_eq!(config.line_format, LineFormat::Legacy);
        assert_eq!(config.contracts_path(), PathBuf::from("/srv/novamint/contracts"));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let mut config = Config::default();
        config.contracts_dir = PathBuf::from("../elsewhere");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath { field: "contracts_dir", .. })));

        let mut config = Config::default();
        config.ledger_file = PathBuf::from("/var/log/tx.log");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath { field: "ledger_file", .. })));
    }

    #[test]
    fn test_rejects_conflicts_and_empty_title() {
        let mut config = Config::default();
        config.transactions_dir = PathBuf::from("contracts");
        assert!(matches!(config.validate(), Err(ConfigError::Conflict(..))));

        let mut config = Config::default();
        config.document_title = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTitle)));
    }

    #[test]
    fn test_conflicts_ignore_current_dir_components() {
        let mut config = Config::default();
        config.contracts_dir = PathBuf::from("./contracts");
        config.transactions_dir = PathBuf::from("contracts/");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Conflict("contracts_dir", "transactions_dir"))
        ));

        let mut config = Config::default();
        config.ledger_file = PathBuf::from("./transactions/.");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Conflict("ledger_file", "transactions_dir"))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novamint.json");
        std::fs::write(&path, r#"{"document_title": "Acme Docs"}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.document_title, "Acme Docs");

        assert!(matches!(
            Config::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
