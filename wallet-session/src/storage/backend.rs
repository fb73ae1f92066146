use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::SessionPaths;
use crate::errors::{WalletError, WalletResult};

/// One write in a batch applied by [`KeyValueStore::write_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Set { key: String, value: String },
    Remove { key: String },
}

impl StoreOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        StoreOp::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        StoreOp::Remove { key: key.into() }
    }
}

/// Durable string key-value persistence local to one profile.
///
/// A batch must become visible to readers as a whole.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>>;
    fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()>;
}

fn apply(map: &mut BTreeMap<String, String>, ops: Vec<StoreOp>) {
    for op in ops {
        match op {
            StoreOp::Set { key, value } => {
                map.insert(key, value);
            }
            StoreOp::Remove { key } => {
                map.remove(&key);
            }
        }
    }
}

/// Process-local store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        let mut entries = self.entries.lock();
        apply(&mut entries, ops);
        Ok(())
    }
}

/// JSON map on disk. Every batch rewrites the file through a temp file and rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_paths(paths: &SessionPaths) -> Self {
        Self::new(paths.credentials_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> WalletResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&self.path)?;
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            WalletError::StorageError(format!(
                "Corrupt credentials file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> WalletResult<()> {
        let serialized = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        apply(&mut entries, ops);
        self.write_all(&entries)
    }
}
