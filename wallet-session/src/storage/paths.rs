use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by native session hosts.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    /// Root directory for session data.
    root_dir: PathBuf,
    /// File holding the persisted credential records.
    credentials_file: PathBuf,
    /// Path to persisted session configuration.
    config_file: PathBuf,
}

impl SessionPaths {
    /// Default credentials file name used on disk.
    pub const DEFAULT_CREDENTIALS_FILENAME: &'static str = "credentials.json";
    /// Default configuration file name used on disk.
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "session.config";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Session root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            credentials_file: root_dir.join(Self::DEFAULT_CREDENTIALS_FILENAME),
            config_file: root_dir.join(Self::DEFAULT_CONFIG_FILENAME),
            root_dir,
        })
    }

    /// Ensure the directory structure exists, creating missing folders.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        Ok(())
    }

    /// Path to the credential records file.
    pub fn credentials_file(&self) -> &Path {
        &self.credentials_file
    }

    /// Path to persisted session configuration file.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Root directory for all session-managed data.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}
