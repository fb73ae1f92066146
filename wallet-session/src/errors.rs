use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    // Session errors
    NotInitialized,
    NotSignedIn,
    InvalidState(String),

    // Approval surface errors
    PopupBlocked,
    UserCancelled,
    Timeout,
    Rejected(String),
    MalformedResponse(String),

    // Local signing errors
    SigningFailed(String),
    SubmissionFailed(String),
    InvalidKey(String),

    // Network errors
    NetworkError(String),

    // Storage errors
    StorageError(String),

    // Validation errors
    ValidationError(String),
    InvalidAccountId(String),

    // Generic errors
    Unknown(String),
}

impl WalletError {
    /// Stable machine-readable code, used by bindings that cannot carry the enum.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::NotInitialized => "NOT_INITIALIZED",
            WalletError::NotSignedIn => "NOT_SIGNED_IN",
            WalletError::InvalidState(_) => "INVALID_STATE",
            WalletError::PopupBlocked => "POPUP_BLOCKED",
            WalletError::UserCancelled => "USER_CANCELLED",
            WalletError::Timeout => "TIMEOUT",
            WalletError::Rejected(_) => "REJECTED",
            WalletError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            WalletError::SigningFailed(_) => "SIGNING_FAILED",
            WalletError::SubmissionFailed(_) => "SUBMISSION_FAILED",
            WalletError::InvalidKey(_) => "INVALID_KEY",
            WalletError::NetworkError(_) => "NETWORK_ERROR",
            WalletError::StorageError(_) => "STORAGE_ERROR",
            WalletError::ValidationError(_) => "VALIDATION_ERROR",
            WalletError::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            WalletError::Unknown(_) => "UNKNOWN",
        }
    }

    /// Errors produced by the approval surface rather than by local code.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            WalletError::PopupBlocked
                | WalletError::UserCancelled
                | WalletError::Timeout
                | WalletError::Rejected(_)
                | WalletError::MalformedResponse(_)
        )
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::NotInitialized => write!(f, "Session not initialized"),
            WalletError::NotSignedIn => write!(f, "Not signed in"),
            WalletError::InvalidState(msg) => write!(f, "Invalid session state: {}", msg),

            WalletError::PopupBlocked => write!(f, "Approval window was blocked"),
            WalletError::UserCancelled => write!(f, "User cancelled the approval"),
            WalletError::Timeout => write!(f, "Approval timed out"),
            WalletError::Rejected(reason) => write!(f, "Rejected by wallet: {}", reason),
            WalletError::MalformedResponse(msg) => write!(f, "Malformed wallet response: {}", msg),

            WalletError::SigningFailed(msg) => write!(f, "Signing failed: {}", msg),
            WalletError::SubmissionFailed(msg) => write!(f, "Submission failed: {}", msg),
            WalletError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),

            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAccountId(msg) => write!(f, "Invalid account id: {}", msg),

            WalletError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        WalletError::StorageError(error.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::ValidationError(format!("JSON error: {}", error))
    }
}
