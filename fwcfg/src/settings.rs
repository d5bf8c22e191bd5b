//! Optional TOML settings file.
//!
//! ```toml
//! config = "/conf/config.xml"
//!
//! [reload]
//! full = "/etc/rc.reload_all"
//! filter = "/etc/rc.filter_configure"
//!
//! [backup]
//! dir = "/conf/backup"
//! ```
//!
//! Command-line flags take precedence over file values, which take
//! precedence over platform defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Configuration document to edit.
    #[serde(default)]
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub reload: ReloadSettings,
    #[serde(default)]
    pub backup: BackupSettings,
}

/// Reload program overrides. Each program is run without arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadSettings {
    #[serde(default)]
    pub full: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupSettings {
    /// Directory for pre-mutation snapshots; defaults to the document's directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_settings(&raw, path.display().to_string())
}

fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsError> {
    toml::from_str(raw).map_err(|source| SettingsError::Parse { path, source })
}
