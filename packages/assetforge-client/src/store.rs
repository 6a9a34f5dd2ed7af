use assetforge_core::{NotificationPreferences, PREFERENCES_STORAGE_KEY};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// 本地键值存储
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<cache dir>/assetforge`, or a relative `.assetforge` when the
    /// platform has no cache dir.
    pub fn default_location() -> Self {
        let dir = dirs::cache_dir()
            .map(|dir| dir.join("assetforge"))
            .unwrap_or_else(|| PathBuf::from(".assetforge"));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Locally cached preferences, kept in memory after the first read.
pub struct PreferenceStore {
    store: Arc<dyn LocalStore>,
    cached: Mutex<Option<NotificationPreferences>>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    /// Cached preferences, or defaults when missing or unreadable. Never fails.
    pub fn load(&self) -> NotificationPreferences {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prefs) = *cached {
            return prefs;
        }

        let prefs = match self.store.get(PREFERENCES_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(error = %e, "cached preferences are corrupt, using defaults");
                    NotificationPreferences::default()
                }
            },
            Ok(None) => {
                debug!("no cached preferences, using defaults");
                NotificationPreferences::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to read cached preferences, using defaults");
                NotificationPreferences::default()
            }
        };
        *cached = Some(prefs);
        prefs
    }

    /// Updates the in-memory copy, then persists it. The in-memory copy is
    /// kept even if persisting fails.
    pub fn store(&self, prefs: &NotificationPreferences) -> crate::HubResult<()> {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(*prefs);
        let raw = serde_json::to_string(prefs)?;
        self.store.set(PREFERENCES_STORAGE_KEY, &raw)?;
        Ok(())
    }

    pub fn backing(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }
}
