use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration from prepdeck.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub identity: Option<IdentityConfig>,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root of the problem data tree (`<dir>/<Company>/<N. Timeframe>.json`)
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    /// Company selected at startup (falls back to Google, then the first company)
    #[serde(default)]
    pub default_company: Option<String>,
    #[serde(default)]
    pub default_timeframe: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            dir: default_data_dir(),
            default_company: None,
            default_timeframe: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for tracked.json, .state.json and the log file.
    /// Defaults to `$XDG_STATE_HOME/prepdeck`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Shared directory acting as the remote document store.
    /// When absent, signing in keeps progress local-only.
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,
}

/// The profile used when signing in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Initial number of materialized rows
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Rows added by "load more"
    #[serde(default = "default_page_size")]
    pub page_increment: usize,
    /// Rows rendered beyond each edge of the viewport
    #[serde(default = "default_overscan")]
    pub overscan: usize,
    /// Row height (in lines) assumed before a row is measured
    #[serde(default = "default_row_height")]
    pub estimated_row_height: usize,
    /// Delay before a filter edit recomputes the list
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Scroll offset (in lines) beyond which the "back to top" hint shows
    #[serde(default = "default_scroll_top_threshold")]
    pub scroll_top_threshold: usize,
    #[serde(default)]
    pub colors: HashMap<String, String>,
    /// Per-difficulty colors keyed by "easy", "medium", "hard"
    #[serde(default)]
    pub difficulty_colors: HashMap<String, String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            page_size: default_page_size(),
            page_increment: default_page_size(),
            overscan: default_overscan(),
            estimated_row_height: default_row_height(),
            debounce_ms: default_debounce_ms(),
            scroll_top_threshold: default_scroll_top_threshold(),
            colors: HashMap::new(),
            difficulty_colors: HashMap::new(),
        }
    }
}

fn default_page_size() -> usize {
    50
}

fn default_overscan() -> usize {
    15
}

fn default_row_height() -> usize {
    2
}

fn default_debounce_ms() -> u64 {
    120
}

fn default_scroll_top_threshold() -> usize {
    8
}
