//! Error and value conversion between the session core and JavaScript.

use js_sys::{Reflect, JSON};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wallet_session_lib::WalletError;
use wasm_bindgen::prelude::*;

/// Error surfaced to JavaScript as an `Error` with a stable `code` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WasmError {
    pub code: String,
    pub message: String,
}

pub type WasmResult<T> = Result<T, WasmError>;

impl WasmError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<WalletError> for WasmError {
    fn from(err: WalletError) -> Self {
        WasmError::new(err.code(), &err.to_string())
    }
}

impl From<WasmError> for JsValue {
    fn from(err: WasmError) -> Self {
        let error = js_sys::Error::new(&err.message);
        let _ = Reflect::set(&error, &"code".into(), &JsValue::from_str(&err.code));
        error.into()
    }
}

pub fn rust_to_js<T: Serialize>(value: &T) -> WasmResult<JsValue> {
    let text = serde_json::to_string(value)
        .map_err(|e| WasmError::new("SERIALIZATION_ERROR", &e.to_string()))?;
    JSON::parse(&text).map_err(|_| WasmError::new("SERIALIZATION_ERROR", "JSON.parse failed"))
}

pub fn js_to_rust<T: DeserializeOwned>(value: &JsValue) -> WasmResult<T> {
    let text = JSON::stringify(value)
        .map_err(|_| WasmError::new("INVALID_ARGUMENT", "Value is not JSON-serializable"))?;
    // `undefined`, functions and symbols stringify to `undefined`.
    let text = text
        .as_string()
        .ok_or_else(|| WasmError::new("INVALID_ARGUMENT", "Value is not JSON-serializable"))?;
    serde_json::from_str(&text).map_err(|e| WasmError::new("INVALID_ARGUMENT", &e.to_string()))
}

/// Structured-clone payload of a `message` event as JSON.
pub fn js_to_json(value: &JsValue) -> Option<serde_json::Value> {
    js_to_rust(value).ok()
}
