use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::storage::SessionPaths;
use crate::validation::InputValidator;

const CONFIG_VERSION: u16 = 1;

pub const ENV_ENVIRONMENT: &str = "WALLET_SESSION_ENV";
pub const ENV_NETWORK: &str = "WALLET_SESSION_NETWORK";
pub const ENV_NODE_URL: &str = "WALLET_SESSION_NODE_URL";
pub const ENV_WALLET_URL: &str = "WALLET_SESSION_WALLET_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network_id: String,
    /// Ledger JSON-RPC endpoint used by the local signer.
    pub node_url: String,
    /// Base URL of the wallet that hosts approval pages.
    pub wallet_url: String,
}

impl NetworkConfig {
    pub fn testnet() -> Self {
        Self {
            network_id: "testnet".to_string(),
            node_url: "https://rpc.testnet.near.org".to_string(),
            wallet_url: "https://testnet.mynearwallet.com".to_string(),
        }
    }

    pub fn mainnet() -> Self {
        Self {
            network_id: "mainnet".to_string(),
            node_url: "https://rpc.mainnet.near.org".to_string(),
            wallet_url: "https://app.mynearwallet.com".to_string(),
        }
    }

    /// Preset for a well-known network id.
    pub fn for_network_id(network_id: &str) -> WalletResult<Self> {
        match network_id {
            "testnet" => Ok(Self::testnet()),
            "mainnet" => Ok(Self::mainnet()),
            other => Err(WalletError::ValidationError(format!(
                "Unknown network '{}'; supply a full network config",
                other
            ))),
        }
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.network_id.trim().is_empty() {
            return Err(WalletError::ValidationError(
                "Network id cannot be empty".to_string(),
            ));
        }
        let validator = InputValidator::shared();
        validator.validate_endpoint(&self.node_url)?;
        validator.validate_endpoint(&self.wallet_url)?;
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::testnet()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalConfig {
    pub popup_width: u32,
    pub popup_height: u32,
    pub poll_interval_ms: u64,
    /// Maximum wait for the wallet; `None` waits until the user acts.
    pub timeout_secs: Option<u64>,
}

impl ApprovalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            popup_width: 480,
            popup_height: 640,
            poll_interval_ms: 300,
            timeout_secs: Some(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: "wallet_session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    pub approval: ApprovalConfig,
    pub storage: StorageConfig,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::default(),
            approval: ApprovalConfig::default(),
            storage: StorageConfig::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Apply `WALLET_SESSION_*` environment overrides on top of the stored config.
    pub fn apply_env_overrides(&mut self) -> WalletResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> WalletResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network_id) = lookup(ENV_NETWORK) {
            if network_id != self.network.network_id {
                self.network = NetworkConfig::for_network_id(&network_id)?;
            }
        }
        if let Some(node_url) = lookup(ENV_NODE_URL) {
            self.network.node_url = node_url;
        }
        if let Some(wallet_url) = lookup(ENV_WALLET_URL) {
            self.network.wallet_url = wallet_url;
        }
        self.network.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
    modified_at_unix: i64,
}

/// Handles persistence of session configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &SessionPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        let checksum = checksum(&envelope.payload)?;
        if checksum != envelope.checksum {
            return Err(WalletError::ValidationError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
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

    pub fn update<F>(
        &self,
        environment: impl Into<String>,
        updater: F,
    ) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}
