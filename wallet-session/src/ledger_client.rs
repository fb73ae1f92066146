/// Ledger RPC client used by the local signer
///
/// Provides HTTP-based JSON-RPC communication with ledger nodes, limited to
/// the two calls local signing needs: the access key view (nonce and recent
/// block hash) and transaction broadcast.
use crate::errors::{WalletError, WalletResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

/// Nonce and reference block for a delegated key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessKeyView {
    pub nonce: u64,
    pub block_hash: String,
    #[serde(default)]
    pub permission: serde_json::Value,
}

/// Ledger outcome of a submitted transaction, returned to callers unmodified.
pub type ExecutionOutcome = serde_json::Value;

/// Ledger operations the local signer depends on.
#[async_trait(?Send)]
pub trait LedgerClient {
    async fn view_access_key(&self, account_id: &str, public_key: &str)
        -> WalletResult<AccessKeyView>;

    /// Submit a base64-encoded signed transaction and wait for its outcome.
    async fn broadcast_transaction(&self, signed_transaction: &str)
        -> WalletResult<ExecutionOutcome>;
}

/// HTTP client for ledger RPC communication
pub struct RpcLedgerClient {
    client: Client,
    base_url: String,
    next_id: AtomicU64,
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: String,
    method: String,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // fields are populated via serde; not all are read by all call sites
struct JsonRpcResponse<T> {
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    id: serde_json::Value,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn describe(&self) -> String {
        match &self.data {
            Some(data) => format!("RPC error {}: {} ({})", self.code, self.message, data),
            None => format!("RPC error {}: {}", self.code, self.message),
        }
    }
}

impl RpcLedgerClient {
    /// Create a new ledger client
    pub fn new(base_url: &str) -> WalletResult<Self> {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        let client = builder.build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(RpcLedgerClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a JSON-RPC call to the node
    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> WalletResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::NetworkError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WalletError::NetworkError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let rpc_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(WalletError::NetworkError(error.describe()));
        }

        rpc_response
            .result
            .ok_or_else(|| WalletError::NetworkError("No result in RPC response".to_string()))
    }
}

#[async_trait(?Send)]
impl LedgerClient for RpcLedgerClient {
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> WalletResult<AccessKeyView> {
        let params = serde_json::json!({
            "request_type": "view_access_key",
            "finality": "final",
            "account_id": account_id,
            "public_key": public_key
        });
        self.rpc_call("query", params).await
    }

    async fn broadcast_transaction(
        &self,
        signed_transaction: &str,
    ) -> WalletResult<ExecutionOutcome> {
        let params = serde_json::json!([signed_transaction]);
        self.rpc_call("broadcast_tx_commit", params).await
    }
}
