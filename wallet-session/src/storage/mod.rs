pub mod backend;
pub mod credentials;
pub mod paths;

pub use backend::{FileStore, KeyValueStore, MemoryStore, StoreOp};
pub use credentials::{CredentialStore, DelegatedKey, SessionState};
pub use paths::SessionPaths;
