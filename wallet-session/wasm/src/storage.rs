//! `localStorage` backend for persisted sessions.

use wallet_session_lib::{KeyValueStore, StoreOp, WalletError, WalletResult};
use web_sys::Storage;

pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Store for the current window.
    pub fn from_window() -> WalletResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| WalletError::StorageError("No window available".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|_| WalletError::StorageError("localStorage is not accessible".to_string()))?
            .ok_or_else(|| WalletError::StorageError("localStorage is unavailable".to_string()))?;
        Ok(Self::new(storage))
    }

    fn apply(&self, op: &StoreOp) -> WalletResult<()> {
        let result = match op {
            StoreOp::Set { key, value } => self.storage.set_item(key, value),
            StoreOp::Remove { key } => self.storage.remove_item(key),
        };
        result.map_err(|e| {
            WalletError::StorageError(format!(
                "localStorage write failed: {}",
                e.as_string().unwrap_or_else(|| "quota exceeded".to_string())
            ))
        })
    }

    fn restore(&self, key: &str, previous: &Option<String>) {
        let _ = match previous {
            Some(value) => self.storage.set_item(key, value),
            None => self.storage.remove_item(key),
        };
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|_| WalletError::StorageError(format!("localStorage read failed for {}", key)))
    }

    /// Applied without yielding to the event loop; a failed write restores the
    /// entries already written by this batch.
    fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        let mut applied: Vec<(&str, Option<String>)> = Vec::with_capacity(ops.len());
        for op in &ops {
            let key = match op {
                StoreOp::Set { key, .. } | StoreOp::Remove { key } => key.as_str(),
            };
            let previous = self.get(key)?;
            if let Err(e) = self.apply(op) {
                for (key, previous) in applied.iter().rev() {
                    self.restore(key, previous);
                }
                return Err(e);
            }
            applied.push((key, previous));
        }
        Ok(())
    }
}
