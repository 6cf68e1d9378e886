//! Ledger configuration.
//!
//! Paths and tunables for the ledger: where the file and its backups live,
//! how long writers wait for the cross-process lock, how stale a cached read
//! snapshot may be, and the traffic-light thresholds for the elapsed-minutes
//! display. Loadable from TOML; every field has a default so an empty file
//! (or none at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::TrafficThresholds;

/// Environment variable overriding the home directory used by
/// [`LedgerConfig::from_default_home`].
pub const HOME_ENV_VAR: &str = "REQLEDGER_HOME";

/// File name of the ledger inside its data directory.
pub const LEDGER_FILE_NAME: &str = "requisitions.jsonl";

/// Errors from configuration loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Could not read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Could not resolve the home directory.
    #[error("cannot resolve home directory: {0}")]
    HomeResolution(String),
}

/// Configuration for the ledger core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path of the ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Directory receiving timestamped backup copies.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Upper bound on the wait for the cross-process write lock, seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Time-to-live of the read cache, seconds. Reads may lag another
    /// process's commit by up to this much.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Traffic-light thresholds for the elapsed-minutes display.
    #[serde(default)]
    pub thresholds: TrafficThresholds,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data").join(LEDGER_FILE_NAME)
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("data").join("backups")
}

const fn default_lock_timeout_secs() -> u64 {
    10
}

const fn default_cache_ttl_secs() -> u64 {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            backup_dir: default_backup_dir(),
            lock_timeout_secs: default_lock_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            thresholds: TrafficThresholds::default(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Configuration rooted under the default home directory:
    /// `$REQLEDGER_HOME` if set, else `~/.reqledger`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HomeResolution`] if no home directory can be
    /// resolved.
    pub fn from_default_home() -> Result<Self, ConfigError> {
        Ok(Self::rooted_at(&home_dir()?))
    }

    /// Configuration with the ledger and its backups under `root`.
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            ledger_path: root.join(LEDGER_FILE_NAME),
            backup_dir: root.join("backups"),
            ..Self::default()
        }
    }

    /// Lock timeout as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Path of the lock marker kept next to the ledger file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name: std::ffi::OsString = self
            .ledger_path
            .file_name()
            .map_or_else(|| LEDGER_FILE_NAME.into(), ToOwned::to_owned);
        name.push(".lock");
        self.ledger_path.with_file_name(name)
    }
}

/// Resolve the home directory: `$REQLEDGER_HOME` first, then `~/.reqledger`.
fn home_dir() -> Result<PathBuf, ConfigError> {
    if let Some(override_dir) = std::env::var_os(HOME_ENV_VAR) {
        let path = PathBuf::from(override_dir);
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }
    let base_dirs = directories::BaseDirs::new().ok_or_else(|| {
        ConfigError::HomeResolution("could not resolve home directory".to_string())
    })?;
    Ok(base_dirs.home_dir().join(".reqledger"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = LedgerConfig::from_toml("").expect("parse");
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.lock_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            ledger_path = "/var/lib/reqledger/requisitions.jsonl"
            lock_timeout_secs = 30

            [thresholds]
            amber_after_minutes = 5
            "#,
        )
        .expect("parse");
        assert_eq!(
            config.ledger_path,
            PathBuf::from("/var/lib/reqledger/requisitions.jsonl")
        );
        assert_eq!(config.lock_timeout_secs, 30);
        assert_eq!(config.cache_ttl_secs, default_cache_ttl_secs());
        assert_eq!(config.thresholds.amber_after_minutes, 5);
        assert_eq!(
            config.thresholds.red_after_minutes,
            TrafficThresholds::default().red_after_minutes
        );
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(
            LedgerConfig::from_toml("lock_timeout_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn lock_path_sits_next_to_ledger() {
        let config = LedgerConfig::rooted_at(Path::new("/srv/reqledger"));
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/srv/reqledger/requisitions.jsonl.lock")
        );
        assert_eq!(
            config.backup_dir,
            PathBuf::from("/srv/reqledger/backups")
        );
    }
}
