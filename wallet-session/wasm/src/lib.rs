//! Wallet Session WebAssembly Library
//!
//! Browser bindings for delegated-key wallet sessions: popup approval
//! surfaces, `localStorage` credentials and a promise-based session API.

use std::rc::Rc;

use js_sys::Promise;
use serde::Deserialize;
use wallet_session_lib::{
    ApprovalConfig, NetworkConfig, SessionService, SignMessageParams, TransactionRequest,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

mod error;
mod storage;
mod surface;

pub use error::{js_to_rust, rust_to_js, WasmError, WasmResult};
pub use storage::LocalStorageStore;
pub use surface::BrowserSurfaceHost;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionOptions {
    #[serde(default)]
    key_prefix: Option<String>,
    #[serde(default)]
    approval: Option<ApprovalConfig>,
}

/// Network given either as a preset name or as a full config object.
#[derive(Deserialize)]
#[serde(untagged)]
enum NetworkInput {
    Preset(String),
    Config(NetworkConfig),
}

/// A wallet session bound to this window.
#[wasm_bindgen]
pub struct WalletSession {
    inner: Rc<SessionService>,
}

#[wasm_bindgen]
impl WalletSession {
    /// Create a session. `options` may carry `keyPrefix` and `approval`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<WalletSession, JsValue> {
        let options: SessionOptions = if options.is_undefined() || options.is_null() {
            SessionOptions::default()
        } else {
            js_to_rust(&options)?
        };

        let backend = Rc::new(LocalStorageStore::from_window().map_err(WasmError::from)?);
        let host = Rc::new(BrowserSurfaceHost::from_window().map_err(WasmError::from)?);
        let mut service = SessionService::new(backend, host);
        if let Some(prefix) = options.key_prefix {
            service = service.with_key_prefix(prefix);
        }
        if let Some(approval) = options.approval {
            service = service.with_approval_config(approval);
        }

        Ok(WalletSession {
            inner: Rc::new(service),
        })
    }

    /// Bind to a network (`"testnet"`, `"mainnet"` or a config object) and
    /// load any persisted session. Returns the resulting status.
    #[wasm_bindgen]
    pub fn initialize(&self, network: JsValue) -> Result<JsValue, JsValue> {
        let network = match js_to_rust::<NetworkInput>(&network)? {
            NetworkInput::Preset(name) => {
                NetworkConfig::for_network_id(&name).map_err(WasmError::from)?
            }
            NetworkInput::Config(config) => config,
        };
        let status = self.inner.initialize(network).map_err(WasmError::from)?;
        Ok(rust_to_js(&status)?)
    }

    #[wasm_bindgen(js_name = isSignedIn)]
    pub fn is_signed_in(&self) -> Result<bool, JsValue> {
        Ok(self.inner.is_signed_in().map_err(WasmError::from)?)
    }

    #[wasm_bindgen(js_name = getAccountId)]
    pub fn get_account_id(&self) -> Result<Option<String>, JsValue> {
        Ok(self.inner.account_id().map_err(WasmError::from)?)
    }

    /// Resolves to the signed-in account id.
    #[wasm_bindgen(js_name = signIn)]
    pub fn sign_in(&self, contract_id: String, methods: JsValue) -> Result<Promise, JsValue> {
        let methods: Vec<String> = if methods.is_undefined() || methods.is_null() {
            Vec::new()
        } else {
            js_to_rust(&methods)?
        };

        let session = self.inner.clone();
        let promise = future_to_promise(async move {
            let account_id = session
                .sign_in(&contract_id, methods)
                .await
                .map_err(WasmError::from)?;
            Ok(JsValue::from_str(&account_id))
        });
        Ok(promise)
    }

    #[wasm_bindgen(js_name = signOut)]
    pub fn sign_out(&self) -> Result<(), JsValue> {
        Ok(self.inner.sign_out().map_err(WasmError::from)?)
    }

    /// Resolves to `{ mode: "local", outcomes }` or
    /// `{ mode: "remote", transactionHashes }`.
    #[wasm_bindgen(js_name = signAndSend)]
    pub fn sign_and_send(&self, transactions: JsValue) -> Result<Promise, JsValue> {
        let transactions: Vec<TransactionRequest> = js_to_rust(&transactions)?;

        let session = self.inner.clone();
        let promise = future_to_promise(async move {
            let outcome = session
                .sign_and_send(transactions)
                .await
                .map_err(WasmError::from)?;
            Ok(rust_to_js(&outcome)?)
        });
        Ok(promise)
    }

    /// `params.nonce` may be a `Uint8Array`, a byte array or a base64 string
    /// of 32 bytes.
    #[wasm_bindgen(js_name = signMessage)]
    pub fn sign_message(&self, params: JsValue) -> Result<Promise, JsValue> {
        let params: SignMessageParams = js_to_rust(&params)?;

        let session = self.inner.clone();
        let promise = future_to_promise(async move {
            let signed = session
                .sign_message(params)
                .await
                .map_err(WasmError::from)?;
            Ok(rust_to_js(&signed)?)
        });
        Ok(promise)
    }

    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> Result<JsValue, JsValue> {
        Ok(rust_to_js(&self.inner.status_report())?)
    }
}

// Module initialization
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"Wallet Session WASM module loaded".into());
}
