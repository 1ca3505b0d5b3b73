use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::error::PrefsError;

/// Persisted account identity, when the user has logged in.
pub const KEY_ACCOUNT: &str = "user_email";
/// Persisted anonymous identity, generated on first launch.
pub const KEY_DEVICE: &str = "device_uuid";
/// Last-used session config (credentials redacted), JSON blob.
pub const KEY_LAST_CONFIG: &str = "last_config";

/// String-keyed preference storage. Writes complete synchronously relative
/// to the caller; implementations must be safe to share across tasks.
pub trait PrefStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError>;
    fn remove(&self, key: &str) -> Result<(), PrefsError>;
}

/// JSON file on disk, one flat string map. Loads tolerantly: a missing or
/// unreadable file starts empty with a warning rather than failing.
pub struct FilePrefs {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FilePrefs {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!("preference file {} unreadable, starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, map: &HashMap<String, String>) -> Result<(), PrefsError> {
        let raw = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl PrefStore for FilePrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.locked().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        let mut map = self.locked();
        map.insert(key.to_string(), value.to_string());
        self.flush(&map)
    }

    fn remove(&self, key: &str) -> Result<(), PrefsError> {
        let mut map = self.locked();
        if map.remove(key).is_some() {
            self.flush(&map)?;
        }
        Ok(())
    }
}

/// In-memory store: the degraded fallback, also used in tests.
#[derive(Default)]
pub struct MemoryPrefs {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PrefStore for MemoryPrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.locked().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.locked().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PrefsError> {
        self.locked().remove(key);
        Ok(())
    }
}
