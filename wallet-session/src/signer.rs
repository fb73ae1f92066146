use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::crypto::{encode_signature, KeyPair};
use crate::errors::{WalletError, WalletResult};
use crate::ledger_client::{ExecutionOutcome, LedgerClient};
use crate::policy;
use crate::storage::SessionState;
use crate::transaction::{Action, TransactionRequest};

#[derive(Debug, Serialize)]
struct UnsignedTransaction<'a> {
    signer_id: &'a str,
    public_key: String,
    nonce: u64,
    receiver_id: &'a str,
    block_hash: &'a str,
    actions: &'a [Action],
}

#[derive(Debug, Serialize)]
struct SignedTransaction<'a> {
    transaction: &'a UnsignedTransaction<'a>,
    hash: String,
    signature: String,
}

/// Signs and submits policy-approved transactions with the delegated key.
#[derive(Clone)]
pub struct LocalSigner {
    ledger: Rc<dyn LedgerClient>,
}

impl LocalSigner {
    pub fn new(ledger: Rc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Sign one batch and return the ledger outcome unmodified. Never retries.
    pub async fn sign_and_submit(
        &self,
        state: &SessionState,
        transaction: &TransactionRequest,
    ) -> WalletResult<ExecutionOutcome> {
        if let policy::PolicyDecision::RequireApproval { reason } =
            policy::evaluate_transaction(state, transaction)
        {
            return Err(WalletError::SigningFailed(format!(
                "delegated key does not cover this transaction: {}",
                reason
            )));
        }
        let delegated = state.active_key().ok_or_else(|| {
            WalletError::SigningFailed("no delegated key available".to_string())
        })?;

        let key_pair = KeyPair::from_secret_key(&delegated.private_key)
            .map_err(|e| WalletError::SigningFailed(format!("persisted key unusable: {}", e)))?;
        let public_key = key_pair.public_key().to_string();

        let access_key = self
            .ledger
            .view_access_key(&state.account_id, &public_key)
            .await
            .map_err(|e| WalletError::SubmissionFailed(e.to_string()))?;

        let nonce = access_key.nonce.checked_add(1).ok_or_else(|| {
            WalletError::SigningFailed("access key nonce exhausted".to_string())
        })?;
        let unsigned = UnsignedTransaction {
            signer_id: &state.account_id,
            public_key,
            nonce,
            receiver_id: &transaction.receiver_id,
            block_hash: &access_key.block_hash,
            actions: &transaction.actions,
        };

        let encoded = canonical_bytes(&unsigned)?;
        let digest = Sha256::digest(&encoded);
        let signature = key_pair.sign(digest.as_slice());
        let signed = SignedTransaction {
            transaction: &unsigned,
            hash: bs58::encode(digest.as_slice()).into_string(),
            signature: encode_signature(&signature),
        };
        let payload = serde_json::to_vec(&signed)
            .map_err(|e| WalletError::SigningFailed(format!("encoding failed: {}", e)))?;

        log::debug!(
            "Submitting locally signed transaction {} to {} (nonce {})",
            signed.hash,
            transaction.receiver_id,
            nonce
        );

        self.ledger
            .broadcast_transaction(&BASE64.encode(payload))
            .await
            .map_err(|e| WalletError::SubmissionFailed(e.to_string()))
    }
}

/// JSON with object keys in sorted order, so the signed bytes can be rebuilt
/// from the submitted envelope.
fn canonical_bytes(transaction: &UnsignedTransaction<'_>) -> WalletResult<Vec<u8>> {
    serde_json::to_value(transaction)
        .and_then(|value| serde_json::to_vec(&value))
        .map_err(|e| WalletError::SigningFailed(format!("encoding failed: {}", e)))
}
