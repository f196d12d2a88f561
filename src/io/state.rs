use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::io::local_store::atomic_write;
use crate::model::filter::{FilterState, SortState};

/// File name of the persisted UI state inside the state directory
pub const STATE_FILE: &str = ".state.json";

/// Persisted session state (written to .state.json)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UiState {
    /// Last selected company
    #[serde(default)]
    pub company: Option<String>,
    /// Last selected timeframe
    #[serde(default)]
    pub timeframe: Option<String>,
    /// Whether the aggregate catalog was showing
    #[serde(default)]
    pub show_all_companies: bool,
    #[serde(default)]
    pub filters: FilterState,
    #[serde(default)]
    pub sort: SortState,
    /// Whether the configured profile is signed in
    #[serde(default)]
    pub signed_in: bool,
}

/// Read .state.json from the state directory
pub fn read_ui_state(state_dir: &Path) -> Option<UiState> {
    let content = fs::read_to_string(state_dir.join(STATE_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write .state.json to the state directory
pub fn write_ui_state(state_dir: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    atomic_write(&state_dir.join(STATE_FILE), content.as_bytes())
}

/// Read-modify-write of the state file; a missing file starts from defaults.
pub fn update_ui_state(
    state_dir: &Path,
    update: impl FnOnce(&mut UiState),
) -> Result<UiState, std::io::Error> {
    let mut state = read_ui_state(state_dir).unwrap_or_default();
    update(&mut state);
    write_ui_state(state_dir, &state)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::filter::{SortDirection, SortField};
    use crate::model::problem::Difficulty;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut state = UiState {
            company: Some("Google".into()),
            timeframe: Some("Thirty Days".into()),
            sort: SortState::new(SortField::Difficulty, SortDirection::Desc),
            signed_in: true,
            ..Default::default()
        };
        state.filters.search = "graph".into();
        state.filters.difficulties.insert(Difficulty::Hard);

        write_ui_state(dir.path(), &state).unwrap();
        assert_eq!(read_ui_state(dir.path()), Some(state));
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn empty_object_uses_defaults() {
        let state: UiState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, UiState::default());
        assert_eq!(state.sort, SortState::default());
    }

    #[test]
    fn update_preserves_other_fields() {
        let dir = TempDir::new().unwrap();
        update_ui_state(dir.path(), |s| s.company = Some("Meta".into())).unwrap();
        let state = update_ui_state(dir.path(), |s| s.signed_in = true).unwrap();
        assert_eq!(state.company.as_deref(), Some("Meta"));
        assert!(state.signed_in);
    }
}
