//! Persistent key-value store consumed by the funnel pages.
//!
//! Values are JSON documents keyed by string. [`SafeStorage`] is the only way the
//! rest of the crate touches a backend: it contains every failure so a corrupted
//! or unavailable store degrades to "no value" instead of breaking a page.

mod memory;
mod migrations;
mod sqlite;

#[cfg(feature = "desktop")]
pub mod commands;

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error};
use serde::{de::DeserializeOwned, Serialize};

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Keys shared between the pages.
pub mod keys {
    pub const TRACKING_PARAMS: &str = "tracking_params_backup";
    pub const QUIZ_ANSWERS: &str = "quiz_answers";
    pub const USER_GENDER: &str = "user_gender";
}

/// Raw string storage. Implementations report faults; [`SafeStorage`] swallows them.
pub trait KeyValueBackend: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SafeStorage {
    backend: Arc<dyn KeyValueBackend>,
}

impl SafeStorage {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    /// Process-local storage, used when no database is available and in tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Reads and parses `key`. An entry that no longer parses is deleted so the
    /// next read starts clean.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                error!("Failed to read storage key '{key}': {err:#}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                error!("Discarding unparsable storage entry '{key}': {err}");
                self.remove(key);
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        self.get(key).unwrap_or(fallback)
    }

    /// Serializes `value` under `key`. Anything that serializes to JSON `null`
    /// removes the key instead of storing a literal null.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                error!("Failed to serialize value for storage key '{key}': {err}");
                return;
            }
        };

        if json.is_null() {
            self.remove(key);
            return;
        }

        if let Err(err) = self.backend.set_raw(key, &json.to_string()) {
            error!("Failed to write storage key '{key}': {err:#}");
        }
    }

    pub fn remove(&self, key: &str) {
        match self.backend.remove(key) {
            Ok(()) => debug!("Removed storage key '{key}'"),
            Err(err) => error!("Failed to remove storage key '{key}': {err:#}"),
        }
    }
}
