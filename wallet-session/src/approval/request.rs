use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::crypto::PublicKey;
use crate::errors::{WalletError, WalletResult};
use crate::transaction::TransactionRequest;

pub const NONCE_LEN: usize = 32;

/// Parameters for an off-chain message signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageParams {
    pub message: String,
    pub recipient: String,
    /// Replay-protection nonce; generated when absent. Accepts a byte array,
    /// a base64 string or a stringified `Uint8Array`.
    #[serde(default, deserialize_with = "deserialize_nonce")]
    pub nonce: Option<[u8; NONCE_LEN]>,
    /// Where the wallet redirects after signing; defaults to the current page.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Echoed back by the wallet. Used as the correlation token when present.
    #[serde(default)]
    pub state: Option<String>,
}

impl SignMessageParams {
    pub fn new(message: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recipient: recipient.into(),
            nonce: None,
            callback_url: None,
            state: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NonceInput {
    Bytes(Vec<u8>),
    Base64(String),
    Indexed(BTreeMap<String, u8>),
}

fn deserialize_nonce<'de, D>(deserializer: D) -> Result<Option<[u8; NONCE_LEN]>, D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = match Option::<NonceInput>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NonceInput::Bytes(bytes)) => bytes,
        Some(NonceInput::Base64(text)) => BASE64
            .decode(text.as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid base64 nonce: {}", e)))?,
        Some(NonceInput::Indexed(entries)) => {
            let mut bytes = vec![0u8; entries.len()];
            for (index, byte) in entries {
                let slot = index
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| bytes.get_mut(i))
                    .ok_or_else(|| D::Error::custom(format!("invalid nonce index {}", index)))?;
                *slot = byte;
            }
            bytes
        }
    };

    <[u8; NONCE_LEN]>::try_from(bytes.as_slice())
        .map(Some)
        .map_err(|_| {
            D::Error::custom(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                bytes.len()
            ))
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalRequest {
    SignIn {
        contract_id: String,
        method_names: Vec<String>,
    },
    SignTransactions {
        transactions: Vec<TransactionRequest>,
    },
    SignMessage(SignMessageParams),
}

impl ApprovalRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalRequest::SignIn { .. } => "sign-in",
            ApprovalRequest::SignTransactions { .. } => "sign-transactions",
            ApprovalRequest::SignMessage(_) => "sign-message",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            ApprovalRequest::SignIn { .. } => "login/",
            ApprovalRequest::SignTransactions { .. } => "sign-transaction/",
            ApprovalRequest::SignMessage(_) => "sign-message",
        }
    }

    /// Sign-in asks the wallet to grant a key bound to a locally generated keypair.
    pub fn needs_ephemeral_key(&self) -> bool {
        matches!(self, ApprovalRequest::SignIn { .. })
    }

    /// Token echoed by the wallet to pair its response with this request.
    pub fn correlation_token(&self) -> String {
        match self {
            ApprovalRequest::SignMessage(SignMessageParams {
                state: Some(state), ..
            }) if !state.is_empty() => state.clone(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Build the wallet URL for this request.
    pub fn to_url(
        &self,
        wallet_url: &Url,
        current_url: &str,
        correlation: &str,
        public_key: Option<&PublicKey>,
    ) -> WalletResult<Url> {
        let base = wallet_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, self.path())).map_err(|e| {
            WalletError::ValidationError(format!("Invalid wallet URL {}: {}", wallet_url, e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            match self {
                ApprovalRequest::SignIn {
                    contract_id,
                    method_names,
                } => {
                    let public_key = public_key.ok_or_else(|| {
                        WalletError::InvalidState("sign-in requires a pending key".to_string())
                    })?;
                    query
                        .append_pair("success_url", current_url)
                        .append_pair("failure_url", current_url)
                        .append_pair("contract_id", contract_id)
                        .append_pair("public_key", &public_key.to_string());
                    for method in method_names {
                        query.append_pair("methodNames", method);
                    }
                }
                ApprovalRequest::SignTransactions { transactions } => {
                    let encoded = serde_json::to_string(transactions)?;
                    query
                        .append_pair("success_url", current_url)
                        .append_pair("failure_url", current_url)
                        .append_pair("transactions", &encoded);
                }
                ApprovalRequest::SignMessage(params) => {
                    let nonce = params.nonce.unwrap_or_else(random_nonce);
                    query
                        .append_pair("message", &params.message)
                        .append_pair("nonce", &BASE64.encode(nonce))
                        .append_pair("recipient", &params.recipient)
                        .append_pair(
                            "callbackUrl",
                            params.callback_url.as_deref().unwrap_or(current_url),
                        );
                }
            }
            query.append_pair("state", correlation);
        }

        Ok(url)
    }
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
