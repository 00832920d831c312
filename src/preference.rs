//! # Image Preference
//!
//! Durable "prefer local copies" flag.
//!
//! ## Storage
//! - One key (`image_preferences`) holding a small JSON object: `{"preferLocal": true}`
//! - Backed by any [`KeyValueStore`], a directory of JSON files in production
//!
//! ## Failure Mode
//! - Nothing stored, including after the store is cleared: reads return the default
//! - Store unreadable or value corrupt: reads fall back to the in-memory value (last write, else default)
//! - Store unwritable: write is logged and dropped, in-memory value and listeners still update
//! - Concurrent writers: last writer wins
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

pub const PREFERENCE_KEY: &str = "image_preferences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePreference {
    pub prefer_local: bool,
}

impl ImagePreference {
    pub const fn new(prefer_local: bool) -> Self {
        Self { prefer_local }
    }
}

impl Default for ImagePreference {
    fn default() -> Self {
        Self { prefer_local: true }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable")]
    Unavailable,

    #[error("Storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stored value: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        StoreError::Unavailable
    }
}

pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).write(key, value)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// One `{key}.json` file per key inside `dir`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        // rename keeps readers from ever seeing a half-written file
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path(key))?;

        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails, like storage in a restricted browsing context.
    pub fn unavailable() -> Self {
        Self {
            values: Mutex::default(),
            unavailable: true,
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }

        Ok(self.values.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }

        self.values.lock()?.insert(key.to_string(), value.to_string());

        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }

        self.values.lock()?.clear();

        Ok(())
    }
}

pub struct PreferenceStore<S> {
    store: S,
    default: ImagePreference,
    current: watch::Sender<ImagePreference>,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(store: S, default: ImagePreference) -> Self {
        let (current, _) = watch::channel(default);

        Self {
            store,
            default,
            current,
        }
    }

    /// Persists the default unless a value is already stored.
    pub fn initialize_with_default(&self) -> Result<ImagePreference, StoreError> {
        if let Some(stored) = self.read_stored()? {
            info!(prefer_local = stored.prefer_local, "Loaded stored image preference");
            self.current.send_replace(stored);
            return Ok(stored);
        }

        info!(
            prefer_local = self.default.prefer_local,
            "No stored image preference, persisting default"
        );
        self.persist(self.default)?;
        self.current.send_replace(self.default);

        Ok(self.default)
    }

    /// Blocking read of the stored value.
    ///
    /// Nothing stored means the default. Unreadable storage keeps the in-memory value.
    pub fn get(&self) -> ImagePreference {
        match self.read_stored() {
            Ok(Some(stored)) => stored,
            Ok(None) => self.default,
            Err(e) => {
                warn!("Image preference unreadable, using in-memory value: {e}");
                *self.current.borrow()
            }
        }
    }

    pub fn set(&self, value: ImagePreference) {
        if let Err(e) = self.persist(value) {
            warn!("Failed to persist image preference: {e}");
        }

        self.current.send_replace(value);
    }

    pub fn default_preference(&self) -> ImagePreference {
        self.default
    }

    pub fn subscribe(&self) -> watch::Receiver<ImagePreference> {
        self.current.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_stored(&self) -> Result<Option<ImagePreference>, StoreError> {
        self.store
            .read(PREFERENCE_KEY)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(Into::into)
    }

    fn persist(&self, value: ImagePreference) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&value)?;

        self.store.write(PREFERENCE_KEY, &raw)
    }
}
