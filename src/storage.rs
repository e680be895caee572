// Device-local key-value storage: one file per key under a fixed root.
use std::{fs, io, path::PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

const PROBE_KEY: &str = "__storage_probe__";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read key {key:?}: {source}")]
    Read { key: String, source: io::Error },
    #[error("failed to write key {key:?}: {source}")]
    Write { key: String, source: io::Error },
    #[error("failed to remove key {key:?}: {source}")]
    Remove { key: String, source: io::Error },
}

pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Storage rooted in the per-user data directory, or a dot-directory in
    /// the working directory when no home can be resolved.
    pub fn open_default() -> Self {
        match ProjectDirs::from("com", "shopscope", "shopscope") {
            Some(proj) => Self::new(proj.data_dir().join("local_storage")),
            None => Self::new(PathBuf::from(".shopscope_storage")),
        }
    }

    /// Write-then-remove probe with a throwaway key; any failure reads as
    /// unavailable (read-only mounts, sandboxes, missing permissions).
    pub fn is_available(&self) -> bool {
        if fs::create_dir_all(&self.root).is_err() {
            return false;
        }
        let probe = self.root.join(PROBE_KEY);
        if fs::write(&probe, PROBE_KEY).is_err() {
            return false;
        }
        fs::remove_file(&probe).is_ok()
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.root.join(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Read {
                key: key.to_string(),
                source: err,
            }),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .and_then(|_| fs::write(self.root.join(key), value))
            .map_err(|err| StorageError::Write {
                key: key.to_string(),
                source: err,
            })
    }

    /// Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.root.join(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Remove {
                key: key.to_string(),
                source: err,
            }),
        }
    }
}
