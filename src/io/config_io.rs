use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::AppConfig;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "prepdeck.toml";

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not edit {path}: {source}")]
    EditError {
        path: PathBuf,
        source: toml_edit::TomlError,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A parsed config plus where it came from. Relative paths inside it have
/// already been resolved against the config file's directory.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: AppConfig,
}

impl LoadedConfig {
    pub fn data_dir(&self) -> &Path {
        &self.config.data.dir
    }

    /// Directory for tracked.json, .state.json and logs
    pub fn state_dir(&self) -> PathBuf {
        self.config
            .storage
            .state_dir
            .clone()
            .unwrap_or_else(default_state_dir)
    }

    pub fn remote_dir(&self) -> Option<&Path> {
        self.config.storage.remote_dir.as_deref()
    }
}

/// Get the user's home directory
fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Default config path, respecting XDG_CONFIG_HOME
pub fn default_config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("prepdeck").join(CONFIG_FILE)
}

/// Default state directory, respecting XDG_STATE_HOME
pub fn default_state_dir() -> PathBuf {
    let state_home = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".local").join("state"));
    state_home.join("prepdeck")
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

/// Load the config. An explicit path must exist; the default location may
/// be absent, in which case every setting takes its default.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };
    let mut config: AppConfig = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    resolve(&base, &mut config.data.dir);
    if let Some(dir) = config.storage.state_dir.as_mut() {
        resolve(&base, dir);
    }
    if let Some(dir) = config.storage.remote_dir.as_mut() {
        resolve(&base, dir);
    }
    Ok(LoadedConfig { path, config })
}

/// Read the config as an editable document; a missing file is an empty one.
pub fn read_config_doc(path: &Path) -> Result<toml_edit::DocumentMut, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    text.parse().map_err(|e| ConfigError::EditError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config_doc(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let write_error = |e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(write_error)?;
    }
    fs::write(path, doc.to_string()).map_err(write_error)
}

/// Set `[data] default_company` and `default_timeframe`. A `None` timeframe
/// removes the key so the company's first timeframe is used.
pub fn set_default_selection(doc: &mut toml_edit::DocumentMut, company: &str, timeframe: Option<&str>) {
    if !doc.contains_key("data") {
        doc["data"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["data"]["default_company"] = toml_edit::value(company);
    match timeframe {
        Some(timeframe) => doc["data"]["default_timeframe"] = toml_edit::value(timeframe),
        None => {
            if let Some(table) = doc["data"].as_table_mut() {
                table.remove("default_timeframe");
            }
        }
    }
}
