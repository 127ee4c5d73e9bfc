//! Durable rule storage.
//!
//! §6 treats the durable store as an external collaborator; this module
//! defines its trait plus one concrete, test-friendly implementation so the
//! two-store consistency invariant (§8) is actually checkable without a
//! real database. `FileStore` is not a production storage engine.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub trait DurableStore: Send + Sync {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Vec<u8>, StoreError>;
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// One file per rule id, written via write-to-temp-then-rename so a reader
/// never observes a partial write, with `sync_all` before the rename so the
/// write is durable on return.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.rule"))
    }

    fn tmp_path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.rule.tmp"))
    }
}

impl DurableStore for FileStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = self.tmp_path_for(id);
        {
            let mut file = fs::File::create(&tmp)?;
            use std::io::Write;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.path_for(id))?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path: &Path = &entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("rule") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
