use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::io::ledger::TrackingMap;
use crate::io::lock::DirLock;

/// File name of the device-local tracking map
pub const TRACKED_FILE: &str = "tracked.json";

/// Device-local persistence of the tracking map.
///
/// Best effort: a missing or unreadable store loads as empty and failed
/// saves are logged and swallowed.
pub trait LocalStore: Send + Sync {
    fn load(&self) -> TrackingMap;
    fn save(&self, map: &TrackingMap);
}

/// Write a file atomically: temp file in the same directory, then rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Drop `false` entries; only completed problems are stored.
pub fn retain_completed(map: &TrackingMap) -> TrackingMap {
    map.iter()
        .filter(|(_, done)| **done)
        .map(|(id, done)| (id.clone(), *done))
        .collect()
}

/// `tracked.json` in the state directory
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    dir: PathBuf,
}

impl FileLocalStore {
    pub fn new(dir: &Path) -> Self {
        FileLocalStore {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TRACKED_FILE)
    }

    fn try_save(&self, map: &TrackingMap) -> Result<(), Box<dyn std::error::Error>> {
        let _lock = DirLock::acquire_default(&self.dir)?;
        let json = serde_json::to_string_pretty(&retain_completed(map))?;
        atomic_write(&self.path(), json.as_bytes())?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn load(&self) -> TrackingMap {
        let path = self.path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return TrackingMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read local tracking");
                return TrackingMap::new();
            }
        };
        match serde_json::from_str::<TrackingMap>(&text) {
            Ok(map) => retain_completed(&map),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt local tracking");
                TrackingMap::new()
            }
        }
    }

    fn save(&self, map: &TrackingMap) {
        match self.try_save(map) {
            Ok(()) => debug!(entries = map.len(), "saved local tracking"),
            Err(e) => warn!(path = %self.path().display(), error = %e, "could not save local tracking"),
        }
    }
}

/// Local store held in memory
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    map: Mutex<TrackingMap>,
}

impl MemoryLocalStore {
    pub fn new(map: TrackingMap) -> Self {
        MemoryLocalStore {
            map: Mutex::new(map),
        }
    }
}

impl LocalStore for MemoryLocalStore {
    fn load(&self) -> TrackingMap {
        self.map.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn save(&self, map: &TrackingMap) {
        *self.map.lock().unwrap_or_else(|e| e.into_inner()) = retain_completed(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn map(ids: &[&str]) -> TrackingMap {
        ids.iter().map(|id| (id.to_string(), true)).collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileLocalStore::new(tmp.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileLocalStore::new(&tmp.path().join("state"));
        let mut tracked = map(&["a", "b"]);
        tracked.insert("c".into(), false);
        store.save(&tracked);

        assert_eq!(store.load(), map(&["a", "b"]));
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("\"c\""));
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(TRACKED_FILE), "{oops").unwrap();
        let store = FileLocalStore::new(tmp.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("file.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
    }
}
