//! Authorization policy for the delegated key.
//!
//! Allow-list only: a batch is signed locally when it is a single zero-deposit
//! `FunctionCall` to the key's scope contract on an allowed method. Every other
//! shape escalates to wallet approval.

use serde::{Deserialize, Serialize};

use crate::storage::SessionState;
use crate::transaction::{parse_amount, Action, TransactionRequest};

/// Outcome of classifying one transaction batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// The delegated key covers the batch.
    SignLocally,
    /// The wallet must approve the batch.
    RequireApproval { reason: String },
}

impl PolicyDecision {
    pub fn is_local(&self) -> bool {
        matches!(self, PolicyDecision::SignLocally)
    }

    fn escalate(reason: impl Into<String>) -> Self {
        PolicyDecision::RequireApproval {
            reason: reason.into(),
        }
    }
}

/// Classify a batch, keeping the reason an escalation happened.
pub fn evaluate(state: &SessionState, receiver_id: &str, actions: &[Action]) -> PolicyDecision {
    let Some(key) = state.active_key() else {
        return PolicyDecision::escalate("no delegated key");
    };

    if key.scope_contract_id != receiver_id {
        return PolicyDecision::escalate(format!(
            "receiver {} is outside key scope {}",
            receiver_id, key.scope_contract_id
        ));
    }

    let action = match actions {
        [single] => single,
        [] => return PolicyDecision::escalate("empty batch"),
        _ => {
            return PolicyDecision::escalate(format!(
                "batch has {} actions; only single calls are delegated",
                actions.len()
            ))
        }
    };

    let Action::FunctionCall {
        method_name,
        deposit,
        ..
    } = action
    else {
        return PolicyDecision::escalate(format!("{} requires approval", action.kind()));
    };

    if parse_amount(deposit) != Some(0) {
        return PolicyDecision::escalate(format!("call attaches deposit {}", deposit));
    }

    if !key.allows_method(method_name) {
        return PolicyDecision::escalate(format!(
            "method {} is not in the key allow-list",
            method_name
        ));
    }

    PolicyDecision::SignLocally
}

pub fn can_sign_locally(state: &SessionState, receiver_id: &str, actions: &[Action]) -> bool {
    evaluate(state, receiver_id, actions).is_local()
}

pub fn evaluate_transaction(state: &SessionState, transaction: &TransactionRequest) -> PolicyDecision {
    evaluate(state, &transaction.receiver_id, &transaction.actions)
}
