use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::backend::{KeyValueStore, StoreOp};
use crate::errors::WalletResult;

/// Narrow-scope key granted by the wallet at sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedKey {
    /// Secret key text (`ed25519:<base58>`).
    pub private_key: String,
    /// The only receiver this key may sign for.
    pub scope_contract_id: String,
    /// Method allow-list; empty means any method on the scope contract.
    #[serde(default)]
    pub allowed_methods: BTreeSet<String>,
}

impl DelegatedKey {
    pub fn new(
        private_key: impl Into<String>,
        scope_contract_id: impl Into<String>,
        allowed_methods: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            private_key: private_key.into(),
            scope_contract_id: scope_contract_id.into(),
            allowed_methods: allowed_methods.into_iter().collect(),
        }
    }

    pub fn allows_method(&self, method_name: &str) -> bool {
        self.allowed_methods.is_empty() || self.allowed_methods.contains(method_name)
    }
}

impl fmt::Debug for DelegatedKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DelegatedKey")
            .field("private_key", &"<redacted>")
            .field("scope_contract_id", &self.scope_contract_id)
            .field("allowed_methods", &self.allowed_methods)
            .finish()
    }
}

impl Drop for DelegatedKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// Persisted unit of identity. An empty `account_id` means signed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub account_id: String,
    pub delegated_key: Option<DelegatedKey>,
}

impl SessionState {
    pub fn signed_in(account_id: impl Into<String>, delegated_key: Option<DelegatedKey>) -> Self {
        Self {
            account_id: account_id.into(),
            delegated_key,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        !self.account_id.is_empty()
    }

    /// Delegated key, only when the state belongs to an account.
    pub fn active_key(&self) -> Option<&DelegatedKey> {
        if self.is_signed_in() {
            self.delegated_key.as_ref()
        } else {
            None
        }
    }
}

/// Reads and writes [`SessionState`] under namespaced records.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Rc<dyn KeyValueStore>,
    account_record: String,
    key_record: String,
}

impl CredentialStore {
    /// Records live under `{prefix}:{network_id}:account_id` and
    /// `{prefix}:{network_id}:delegated_key`.
    pub fn new(backend: Rc<dyn KeyValueStore>, prefix: &str, network_id: &str) -> Self {
        Self {
            backend,
            account_record: format!("{}:{}:account_id", prefix, network_id),
            key_record: format!("{}:{}:delegated_key", prefix, network_id),
        }
    }

    pub fn account_record(&self) -> &str {
        &self.account_record
    }

    pub fn key_record(&self) -> &str {
        &self.key_record
    }

    /// Load the persisted state. Unreadable records yield the signed-out state.
    pub fn load(&self) -> SessionState {
        match self.try_load() {
            Ok(state) => state,
            Err(err) => {
                log::warn!("Discarding unreadable session record: {}", err);
                SessionState::default()
            }
        }
    }

    fn try_load(&self) -> WalletResult<SessionState> {
        let account_id = self
            .backend
            .get(&self.account_record)?
            .unwrap_or_default();
        if account_id.is_empty() {
            return Ok(SessionState::default());
        }

        let delegated_key = match self.backend.get(&self.key_record)? {
            Some(raw) => Some(serde_json::from_str::<DelegatedKey>(&raw)?),
            None => None,
        };

        Ok(SessionState {
            account_id,
            delegated_key,
        })
    }

    /// Replace the persisted state in one batch.
    pub fn save(&self, state: &SessionState) -> WalletResult<()> {
        let mut ops = Vec::with_capacity(2);
        if !state.is_signed_in() {
            ops.push(StoreOp::remove(self.account_record.clone()));
            ops.push(StoreOp::remove(self.key_record.clone()));
            return self.backend.write_batch(ops);
        }

        ops.push(StoreOp::set(
            self.account_record.clone(),
            state.account_id.clone(),
        ));
        match &state.delegated_key {
            Some(key) => ops.push(StoreOp::set(
                self.key_record.clone(),
                serde_json::to_string(key)?,
            )),
            None => ops.push(StoreOp::remove(self.key_record.clone())),
        }
        self.backend.write_batch(ops)
    }

    pub fn clear(&self) -> WalletResult<()> {
        self.save(&SessionState::default())
    }
}
