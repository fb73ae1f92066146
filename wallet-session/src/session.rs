use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::approval::{
    ApprovalChannel, ApprovalRequest, SignMessageParams, SurfaceHost, WalletResponse,
};
use crate::config_store::{ApprovalConfig, NetworkConfig, StorageConfig, WalletConfig};
use crate::crypto::{KeyPair, PublicKey};
use crate::errors::{WalletError, WalletResult};
use crate::ledger_client::{ExecutionOutcome, LedgerClient, RpcLedgerClient};
use crate::policy::{self, PolicyDecision};
use crate::signer::LocalSigner;
use crate::storage::{CredentialStore, DelegatedKey, KeyValueStore, SessionState};
use crate::transaction::TransactionRequest;
use crate::validation::InputValidator;

const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    SignedOut,
    SigningIn,
    SignedIn,
    Error,
}

/// Point-in-time view of the session for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: SessionStatus,
    pub account_id: Option<String>,
    pub network_id: Option<String>,
    pub last_error: Option<String>,
    pub last_error_code: Option<String>,
}

/// Result of `sign_and_send`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Every batch was signed with the delegated key; outcomes in request order.
    Local { outcomes: Vec<ExecutionOutcome> },
    /// The wallet signed and submitted the whole set.
    Remote {
        #[serde(rename = "transactionHashes")]
        transaction_hashes: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub account_id: String,
    pub public_key: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Components bound to one network by `initialize`.
struct Runtime {
    network: NetworkConfig,
    credentials: CredentialStore,
    approval: ApprovalChannel,
    signer: LocalSigner,
}

#[derive(Debug, Default)]
struct Inner {
    status: Option<SessionStatus>,
    state: SessionState,
    last_error: Option<WalletError>,
}

impl Inner {
    fn settled_status(&self) -> SessionStatus {
        if self.state.is_signed_in() {
            SessionStatus::SignedIn
        } else {
            SessionStatus::SignedOut
        }
    }
}

/// Session orchestrator: composes the credential store, policy, local signer
/// and approval channel behind the public session operations.
pub struct SessionService {
    backend: Rc<dyn KeyValueStore>,
    host: Rc<dyn SurfaceHost>,
    ledger: Option<Rc<dyn LedgerClient>>,
    approval_config: ApprovalConfig,
    storage_config: StorageConfig,
    runtime: RwLock<Option<Rc<Runtime>>>,
    inner: RwLock<Inner>,
}

impl SessionService {
    pub fn new(backend: Rc<dyn KeyValueStore>, host: Rc<dyn SurfaceHost>) -> Self {
        Self {
            backend,
            host,
            ledger: None,
            approval_config: ApprovalConfig::default(),
            storage_config: StorageConfig::default(),
            runtime: RwLock::new(None),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Service configured from a stored [`WalletConfig`]. The network is still
    /// bound by [`SessionService::initialize`].
    pub fn from_config(
        config: &WalletConfig,
        backend: Rc<dyn KeyValueStore>,
        host: Rc<dyn SurfaceHost>,
    ) -> Self {
        Self::new(backend, host)
            .with_approval_config(config.approval.clone())
            .with_key_prefix(config.storage.key_prefix.clone())
    }

    pub fn with_approval_config(mut self, config: ApprovalConfig) -> Self {
        self.approval_config = config;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_config.key_prefix = prefix.into();
        self
    }

    /// Use `ledger` instead of an RPC client built from the network config.
    pub fn with_ledger(mut self, ledger: Rc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Bind the service to `network` and load any persisted session.
    pub fn initialize(&self, network: NetworkConfig) -> WalletResult<SessionStatus> {
        let runtime = match self.build_runtime(network) {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("Session initialization failed: {}", e);
                let mut inner = self.inner.write();
                inner.status = Some(SessionStatus::Error);
                inner.last_error = Some(e.clone());
                return Err(e);
            }
        };

        let state = runtime.credentials.load();
        let network_id = runtime.network.network_id.clone();
        *self.runtime.write() = Some(Rc::new(runtime));

        let mut inner = self.inner.write();
        inner.state = state;
        inner.last_error = None;
        let status = inner.settled_status();
        inner.status = Some(status);
        log::info!(
            "Session initialized on {} ({:?})",
            network_id,
            status
        );
        Ok(status)
    }

    fn build_runtime(&self, network: NetworkConfig) -> WalletResult<Runtime> {
        network.validate()?;
        let ledger: Rc<dyn LedgerClient> = match &self.ledger {
            Some(ledger) => ledger.clone(),
            None => Rc::new(RpcLedgerClient::new(&network.node_url)?),
        };
        let credentials = CredentialStore::new(
            self.backend.clone(),
            &self.storage_config.key_prefix,
            &network.network_id,
        );
        let approval = ApprovalChannel::new(
            self.host.clone(),
            &network.wallet_url,
            self.approval_config.clone(),
        )?;

        Ok(Runtime {
            network,
            credentials,
            approval,
            signer: LocalSigner::new(ledger),
        })
    }

    fn runtime(&self) -> WalletResult<Rc<Runtime>> {
        self.runtime
            .read()
            .as_ref()
            .cloned()
            .ok_or(WalletError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.read().is_some()
    }

    pub fn is_signed_in(&self) -> WalletResult<bool> {
        self.runtime()?;
        Ok(self.inner.read().state.is_signed_in())
    }

    /// Signed-in account, or `None` when signed out.
    pub fn account_id(&self) -> WalletResult<Option<String>> {
        self.runtime()?;
        let inner = self.inner.read();
        Ok(inner
            .state
            .is_signed_in()
            .then(|| inner.state.account_id.clone()))
    }

    /// Current status. Before `initialize` this reports `SignedOut`.
    pub fn status(&self) -> SessionStatus {
        self.inner
            .read()
            .status
            .unwrap_or(SessionStatus::SignedOut)
    }

    pub fn last_error(&self) -> Option<WalletError> {
        self.inner.read().last_error.clone()
    }

    pub fn network(&self) -> Option<NetworkConfig> {
        self.runtime
            .read()
            .as_ref()
            .map(|runtime| runtime.network.clone())
    }

    pub fn status_report(&self) -> StatusReport {
        let network_id = self.network().map(|network| network.network_id);
        let inner = self.inner.read();
        StatusReport {
            status: inner.status.unwrap_or(SessionStatus::SignedOut),
            account_id: inner
                .state
                .is_signed_in()
                .then(|| inner.state.account_id.clone()),
            network_id,
            last_error: inner.last_error.as_ref().map(ToString::to_string),
            last_error_code: inner.last_error.as_ref().map(|e| e.code().to_string()),
        }
    }

    /// Ask the wallet for an account and a delegated key scoped to `contract_id`.
    ///
    /// An empty `method_names` requests a key valid for any method on the
    /// contract. Returns the signed-in account id.
    pub async fn sign_in(
        &self,
        contract_id: &str,
        method_names: Vec<String>,
    ) -> WalletResult<String> {
        let runtime = self.runtime()?;
        let validator = InputValidator::shared();
        validator.validate_account_id(contract_id)?;
        for method in &method_names {
            validator.validate_method_name(method)?;
        }

        {
            let mut inner = self.inner.write();
            if inner.status == Some(SessionStatus::SigningIn) {
                return Err(WalletError::InvalidState(
                    "sign-in already in progress".to_string(),
                ));
            }
            inner.status = Some(SessionStatus::SigningIn);
        }
        let _reset = SigningInReset { inner: &self.inner };

        let request = ApprovalRequest::SignIn {
            contract_id: contract_id.to_string(),
            method_names: method_names.clone(),
        };
        let result = runtime
            .approval
            .request_approval(request, |response, key| {
                grant_from_response(response, key, contract_id, &method_names)
            })
            .await
            .and_then(|state| {
                runtime.credentials.save(&state)?;
                Ok(state)
            });

        let mut inner = self.inner.write();
        match result {
            Ok(state) => {
                let account_id = state.account_id.clone();
                inner.state = state;
                inner.status = Some(SessionStatus::SignedIn);
                inner.last_error = None;
                log::info!("Signed in as {} for {}", account_id, contract_id);
                Ok(account_id)
            }
            Err(e) => {
                log::warn!("Sign-in failed, session not connected: {}", e);
                inner.status = Some(inner.settled_status());
                inner.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Clear the persisted session.
    pub fn sign_out(&self) -> WalletResult<()> {
        let runtime = self.runtime()?;
        runtime.credentials.clear()?;

        let mut inner = self.inner.write();
        inner.state = SessionState::default();
        inner.status = Some(SessionStatus::SignedOut);
        inner.last_error = None;
        log::info!("Signed out");
        Ok(())
    }

    /// Submit `transactions`, locally when the delegated key covers every
    /// batch, otherwise as one wallet approval for the whole set.
    pub async fn sign_and_send(
        &self,
        transactions: Vec<TransactionRequest>,
    ) -> WalletResult<SendOutcome> {
        let runtime = self.runtime()?;
        let state = self.inner.read().state.clone();
        if !state.is_signed_in() {
            return Err(WalletError::NotSignedIn);
        }
        if transactions.is_empty() {
            return Err(WalletError::ValidationError(
                "No transactions to send".to_string(),
            ));
        }
        let validator = InputValidator::shared();
        for transaction in &transactions {
            validator.validate_account_id(&transaction.receiver_id)?;
        }

        let escalation = transactions.iter().find_map(|transaction| {
            match policy::evaluate_transaction(&state, transaction) {
                PolicyDecision::SignLocally => None,
                PolicyDecision::RequireApproval { reason } => Some(reason),
            }
        });

        match escalation {
            None => {
                let mut outcomes = Vec::with_capacity(transactions.len());
                for transaction in &transactions {
                    outcomes.push(runtime.signer.sign_and_submit(&state, transaction).await?);
                }
                log::info!("Submitted {} transaction(s) locally", outcomes.len());
                Ok(SendOutcome::Local { outcomes })
            }
            Some(reason) => {
                log::info!(
                    "Escalating {} transaction(s) to wallet approval: {}",
                    transactions.len(),
                    reason
                );
                let transaction_hashes = runtime
                    .approval
                    .request_approval(
                        ApprovalRequest::SignTransactions { transactions },
                        |response, _| hashes_from_response(response),
                    )
                    .await?;
                Ok(SendOutcome::Remote { transaction_hashes })
            }
        }
    }

    /// Ask the wallet to sign an off-chain message. Never signed locally.
    pub async fn sign_message(&self, params: SignMessageParams) -> WalletResult<SignedMessage> {
        let runtime = self.runtime()?;
        if !self.inner.read().state.is_signed_in() {
            return Err(WalletError::NotSignedIn);
        }
        if params.message.is_empty() {
            return Err(WalletError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }
        InputValidator::shared().validate_account_id(&params.recipient)?;

        runtime
            .approval
            .request_approval(ApprovalRequest::SignMessage(params), |response, _| {
                signed_message_from_response(response)
            })
            .await
    }
}

/// Leaves `SigningIn` if the sign-in future is dropped before it settles.
struct SigningInReset<'a> {
    inner: &'a RwLock<Inner>,
}

impl Drop for SigningInReset<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.write();
        if inner.status == Some(SessionStatus::SigningIn) {
            inner.status = Some(inner.settled_status());
        }
    }
}

fn grant_from_response(
    response: WalletResponse,
    key: Option<KeyPair>,
    contract_id: &str,
    method_names: &[String],
) -> WalletResult<SessionState> {
    let account_id = response
        .account_id
        .filter(|account| !account.is_empty())
        .ok_or_else(|| WalletError::MalformedResponse("missing account_id".to_string()))?;
    InputValidator::shared()
        .validate_account_id(&account_id)
        .map_err(|e| WalletError::MalformedResponse(e.to_string()))?;

    let key = key.ok_or_else(|| {
        WalletError::InvalidState("sign-in completed without a pending key".to_string())
    })?;
    if let Some(granted) = response.public_key.as_deref() {
        if granted != key.public_key().to_string() {
            return Err(WalletError::MalformedResponse(
                "wallet granted a different public key".to_string(),
            ));
        }
    }

    let delegated = DelegatedKey::new(
        key.secret_key().as_str(),
        contract_id,
        method_names.iter().cloned(),
    );
    Ok(SessionState::signed_in(account_id, Some(delegated)))
}

fn hashes_from_response(response: WalletResponse) -> WalletResult<Vec<String>> {
    let hashes = response
        .transaction_hashes
        .map(|hashes| hashes.into_vec())
        .unwrap_or_default();
    if hashes.is_empty() {
        return Err(WalletError::MalformedResponse(
            "missing transactionHashes".to_string(),
        ));
    }
    Ok(hashes)
}

fn signed_message_from_response(response: WalletResponse) -> WalletResult<SignedMessage> {
    let signed = response
        .signed_request
        .ok_or_else(|| WalletError::MalformedResponse("missing signedRequest".to_string()))?;

    signed
        .public_key
        .parse::<PublicKey>()
        .map_err(|e| WalletError::MalformedResponse(e.to_string()))?;
    let signature = BASE64
        .decode(&signed.signature)
        .map_err(|e| WalletError::MalformedResponse(format!("signature: {}", e)))?;
    if signature.len() != SIGNATURE_LEN {
        return Err(WalletError::MalformedResponse(format!(
            "signature has {} bytes",
            signature.len()
        )));
    }

    Ok(SignedMessage {
        account_id: signed.account_id,
        public_key: signed.public_key,
        signature: signed.signature,
        state: response.state,
    })
}
