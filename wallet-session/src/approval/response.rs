//! Inbound wallet messages.

use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};

/// Tag every wallet reply carries in its `type` field.
pub const RESPONSE_TYPE: &str = "wallet-response";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TransactionHashes {
    List(Vec<String>),
    Joined(String),
}

impl TransactionHashes {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TransactionHashes::List(hashes) => hashes,
            TransactionHashes::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub account_id: String,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WalletResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default, rename = "transactionHashes")]
    pub transaction_hashes: Option<TransactionHashes>,
    #[serde(default, rename = "signedRequest")]
    pub signed_request: Option<SignedRequest>,
    #[serde(default)]
    pub state: Option<String>,
}

impl WalletResponse {
    fn rejection(&self) -> Option<String> {
        match &self.error {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(reason)) => Some(reason.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Filter one inbound message for the request identified by `state`.
///
/// Returns `Ok(None)` for messages that belong to someone else: wrong origin,
/// a different `type`, or a different echoed state. A missing echoed state is
/// accepted on origin and tag alone.
pub fn accept(
    origin: &str,
    data: &serde_json::Value,
    expected_origin: &str,
    state: &str,
) -> WalletResult<Option<WalletResponse>> {
    if origin != expected_origin {
        log::debug!("Ignoring message from unexpected origin {}", origin);
        return Ok(None);
    }
    if data.get("type").and_then(|t| t.as_str()) != Some(RESPONSE_TYPE) {
        return Ok(None);
    }

    // Correlation is checked before the schema.
    if let Some(echoed) = data.get("state").and_then(|s| s.as_str()) {
        if echoed != state {
            log::debug!("Ignoring wallet response for another request");
            return Ok(None);
        }
    }

    let response: WalletResponse = serde_json::from_value(data.clone())
        .map_err(|e| WalletError::MalformedResponse(e.to_string()))?;

    if let Some(reason) = response.rejection() {
        return Err(WalletError::Rejected(reason));
    }

    Ok(Some(response))
}
