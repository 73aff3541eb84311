//! In-memory storage testing utilities
//!
//! - [`InMemoryStorage`]: HashMap-backed [`KeyValueStorage`] with inspection helpers
//! - [`FailingStorage`]: Backend whose writes always fail, for persistence error paths

#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use storefront_core::environment::{KeyValueStorage, StorageError};

/// In-memory key-value storage for fast, deterministic testing.
///
/// Clones share the same map, so a test can keep one handle for assertions
/// while the code under test owns another.
///
/// # Example
///
/// ```
/// use storefront_testing::InMemoryStorage;
/// use storefront_core::environment::KeyValueStorage;
///
/// let storage = InMemoryStorage::new();
/// storage.set("cartItems", "[]").unwrap();
/// assert_eq!(storage.get("cartItems").unwrap().as_deref(), Some("[]"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
    writes: Arc<RwLock<usize>>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage pre-seeded with the given pairs
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let storage = Self::new();
        if let Ok(mut data) = storage.data.write() {
            for (key, value) in entries {
                data.insert(key.to_string(), value.to_string());
            }
        }
        storage
    }

    /// Raw value of a key (for assertions)
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.read().ok().and_then(|data| data.get(key).cloned())
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.read().is_ok_and(|data| data.contains_key(key))
    }

    /// Number of successful `set` calls so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.read().map(|w| *w).unwrap_or_default()
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let data = self.data.read().map_err(|_| StorageError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::Poisoned)?;
        data.insert(key.to_string(), value.to_string());
        let mut writes = self.writes.write().map_err(|_| StorageError::Poisoned)?;
        *writes += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::Poisoned)?;
        data.remove(key);
        Ok(())
    }
}

/// Storage that can be read but refuses every write.
///
/// Reads return the seeded values; `set` and `remove` fail with
/// [`StorageError::Io`].
#[derive(Clone, Debug, Default)]
pub struct FailingStorage {
    seed: HashMap<String, String>,
}

impl FailingStorage {
    /// Storage with nothing stored
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose reads return `value` for `key`
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut seed = HashMap::new();
        seed.insert(key.to_string(), value.to_string());
        Self { seed }
    }

    fn refuse(key: &str) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            message: "storage is read-only".to_string(),
        }
    }
}

impl KeyValueStorage for FailingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.seed.get(key).cloned())
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(Self::refuse(key))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Err(Self::refuse(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_round_trip() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("token").unwrap(), None);

        storage.set("token", "abc").unwrap();
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.write_count(), 1);

        storage.remove("token").unwrap();
        assert!(!storage.contains("token"));
        storage.remove("token").unwrap();
    }

    #[test]
    fn clones_share_contents() {
        let storage = InMemoryStorage::with_entries([("theme", "dark")]);
        let handle = storage.clone();

        handle.set("user", "{}").unwrap();

        assert_eq!(storage.raw("user").as_deref(), Some("{}"));
        assert_eq!(storage.raw("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn failing_storage_reads_seed_and_rejects_writes() {
        let storage = FailingStorage::with_entry("cartItems", "[]");

        assert_eq!(storage.get("cartItems").unwrap().as_deref(), Some("[]"));
        assert!(matches!(
            storage.set("cartItems", "[]"),
            Err(StorageError::Io { .. })
        ));
        assert!(storage.remove("cartItems").is_err());
    }
}
