//! Persistent local storage on disk.
//!
//! [`FileStorage`] keeps one file per key inside a data directory, the
//! command-line counterpart of browser local storage.

use std::io;
use std::path::{Path, PathBuf};
use storefront_core::environment::{KeyValueStorage, StorageError};

/// Storage keys used by the storefront
pub mod keys {
    /// Serialised cart ledger
    pub const CART_ITEMS: &str = "cartItems";
    /// Raw bearer token
    pub const TOKEN: &str = "token";
    /// Signed-in user record (`{"userId", "isAdmin"}`)
    pub const USER: &str = "user";
}

/// Directory-backed key-value storage
///
/// Writes go to a temporary sibling file that is then renamed over the key's
/// file, so a crash never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) the storage directory
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| io_error("<dir>", &e))?;
        tracing::debug!(dir = %dir.display(), "Opened file storage");
        Ok(Self { dir })
    }

    /// Directory holding the key files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

        if valid {
            Ok(self.dir.join(key))
        } else {
            Err(StorageError::Io {
                key: key.to_string(),
                message: "invalid storage key".to_string(),
            })
        }
    }
}

fn io_error(key: &str, error: &io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        message: error.to_string(),
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, &e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let staging = self.dir.join(format!(".{key}.tmp"));

        std::fs::write(&staging, value).map_err(|e| io_error(key, &e))?;
        std::fs::rename(&staging, &path).map_err(|e| io_error(key, &e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, &e)),
        }
    }
}
