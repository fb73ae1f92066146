// lib.rs - Core library structure for the wallet session

pub mod app_state;
pub mod approval;
pub mod config_store;
pub mod crypto;
pub mod errors;
pub mod ledger_client;
pub mod policy;
pub mod session;
pub mod signer;
pub mod storage;
pub mod transaction;
pub mod validation;

// Re-export common types
pub use app_state::SessionContext;
pub use approval::{
    ApprovalChannel, ApprovalRequest, OpenedSurface, SignMessageParams, SurfaceEvent,
    SurfaceFeatures, SurfaceHandle, SurfaceHost, WalletResponse,
};
pub use config_store::{ApprovalConfig, ConfigStore, NetworkConfig, StorageConfig, WalletConfig};
pub use crypto::{KeyPair, PublicKey};
pub use errors::{WalletError, WalletResult};
pub use ledger_client::{AccessKeyView, ExecutionOutcome, LedgerClient, RpcLedgerClient};
pub use policy::{can_sign_locally, PolicyDecision};
pub use session::{SendOutcome, SessionService, SessionStatus, SignedMessage, StatusReport};
pub use signer::LocalSigner;
pub use storage::{
    CredentialStore, DelegatedKey, FileStore, KeyValueStore, MemoryStore, SessionPaths,
    SessionState, StoreOp,
};
pub use transaction::{Action, TransactionRequest};
pub use validation::InputValidator;
