/// Transaction request types shared by the policy, the local signer and the
/// approval channel.
///
/// Actions serialize as `{ "type": <Variant>, "params": { ... } }`, the shape
/// the wallet expects in its `transactions` query parameter.
use serde::{Deserialize, Serialize};

/// Gas attached to function calls when the caller does not choose.
pub const DEFAULT_FUNCTION_CALL_GAS: &str = "30000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Action {
    CreateAccount,
    #[serde(rename_all = "camelCase")]
    DeployContract {
        /// Base64-encoded contract code.
        code: String,
    },
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        method_name: String,
        #[serde(default)]
        args: serde_json::Value,
        #[serde(default = "default_gas")]
        gas: String,
        #[serde(default = "zero_amount")]
        deposit: String,
    },
    #[serde(rename_all = "camelCase")]
    Transfer { deposit: String },
    #[serde(rename_all = "camelCase")]
    Stake { stake: String, public_key: String },
    #[serde(rename_all = "camelCase")]
    AddKey {
        public_key: String,
        access_key: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    DeleteKey { public_key: String },
    #[serde(rename_all = "camelCase")]
    DeleteAccount { beneficiary_id: String },
}

impl Action {
    /// Zero-deposit function call with default gas.
    pub fn function_call(method_name: impl Into<String>, args: serde_json::Value) -> Self {
        Action::FunctionCall {
            method_name: method_name.into(),
            args,
            gas: default_gas(),
            deposit: zero_amount(),
        }
    }

    /// Replace the deposit of a function call; other actions are returned unchanged.
    pub fn with_deposit(self, amount: impl Into<String>) -> Self {
        match self {
            Action::FunctionCall {
                method_name,
                args,
                gas,
                ..
            } => Action::FunctionCall {
                method_name,
                args,
                gas,
                deposit: amount.into(),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateAccount => "CreateAccount",
            Action::DeployContract { .. } => "DeployContract",
            Action::FunctionCall { .. } => "FunctionCall",
            Action::Transfer { .. } => "Transfer",
            Action::Stake { .. } => "Stake",
            Action::AddKey { .. } => "AddKey",
            Action::DeleteKey { .. } => "DeleteKey",
            Action::DeleteAccount { .. } => "DeleteAccount",
        }
    }
}

/// One batch of actions addressed to a single receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub receiver_id: String,
    pub actions: Vec<Action>,
}

impl TransactionRequest {
    pub fn new(receiver_id: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            actions,
        }
    }
}

/// Parse a decimal amount in the ledger's smallest unit.
///
/// Returns `None` for anything that is not a plain non-negative integer, so
/// callers treat unparsable amounts as unsafe.
pub fn parse_amount(amount: &str) -> Option<u128> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<u128>().ok()
}

fn default_gas() -> String {
    DEFAULT_FUNCTION_CALL_GAS.to_string()
}

fn zero_amount() -> String {
    "0".to_string()
}
