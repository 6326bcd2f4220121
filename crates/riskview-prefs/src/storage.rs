//! `PreferenceStorage` backends.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tracing::debug;

use riskview_contracts::error::{RiskViewError, RiskViewResult};
use riskview_core::traits::PreferenceStorage;

/// File name under the platform config directory.
const DEFAULT_FILE: &str = "theme-mode";
const APP_DIR: &str = "riskview";

/// One plain-text file holding `light` or `dark`.
#[derive(Debug, Clone)]
pub struct FilePreferenceStorage {
    path: PathBuf,
}

impl FilePreferenceStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/riskview/theme-mode`, or `None` when the platform has
    /// no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(DEFAULT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failure(&self, action: &str, err: io::Error) -> RiskViewError {
        RiskViewError::Persistence {
            reason: format!("could not {action} {}: {err}", self.path.display()),
        }
    }
}

impl PreferenceStorage for FilePreferenceStorage {
    fn load(&self) -> RiskViewResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw.trim().to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.failure("read", err)),
        }
    }

    fn save(&self, value: &str) -> RiskViewResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.failure("create directory for", err))?;
        }
        fs::write(&self.path, value).map_err(|err| self.failure("write", err))?;
        debug!(path = %self.path.display(), value, "preference persisted");
        Ok(())
    }

    fn clear(&self) -> RiskViewResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.failure("remove", err)),
        }
    }
}

/// Process-local storage. Clones share the same slot, so a test can keep a
/// handle, drop the store and initialize a new one to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPreferenceStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl InMemoryPreferenceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds `value`.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value.into()))),
        }
    }

    fn lock(&self) -> RiskViewResult<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot.lock().map_err(|e| RiskViewError::Persistence {
            reason: format!("preference slot lock poisoned: {e}"),
        })
    }
}

impl PreferenceStorage for InMemoryPreferenceStorage {
    fn load(&self) -> RiskViewResult<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, value: &str) -> RiskViewResult<()> {
        *self.lock()? = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> RiskViewResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePreferenceStorage::new(dir.path().join("nested").join("theme-mode"));

        assert_eq!(storage.load().unwrap(), None);
        storage.save("dark").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("dark"));

        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
        // Clearing twice is fine.
        storage.clear().unwrap();
    }

    #[test]
    fn file_storage_trims_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme-mode");
        fs::write(&path, "light\n").unwrap();

        let storage = FilePreferenceStorage::new(&path);
        assert_eq!(storage.load().unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn unwritable_path_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let storage = FilePreferenceStorage::new(dir.path());
        assert!(matches!(
            storage.save("dark"),
            Err(RiskViewError::Persistence { .. })
        ));
    }

    #[test]
    fn in_memory_clones_share_the_slot() {
        let storage = InMemoryPreferenceStorage::new();
        let handle = storage.clone();
        storage.save("dark").unwrap();
        assert_eq!(handle.load().unwrap().as_deref(), Some("dark"));
        handle.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
