use crate::errors::{WalletError, WalletResult};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

const MIN_ACCOUNT_ID_LEN: usize = 2;
const MAX_ACCOUNT_ID_LEN: usize = 64;
const MAX_METHOD_NAME_LEN: usize = 256;

static SHARED: Lazy<InputValidator> = Lazy::new(InputValidator::default);

/// Input validation utilities for account ids, method names and endpoints
pub struct InputValidator {
    // Compiled regex patterns for performance
    account_id_pattern: Regex,
    method_name_pattern: Regex,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let account_id_pattern =
            Regex::new(r"^(([a-z\d]+[\-_])*[a-z\d]+\.)*([a-z\d]+[\-_])*[a-z\d]+$").map_err(|e| {
                WalletError::ValidationError(format!("Invalid account id regex: {}", e))
            })?;

        let method_name_pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").map_err(|e| {
            WalletError::ValidationError(format!("Invalid method name regex: {}", e))
        })?;

        Ok(InputValidator {
            account_id_pattern,
            method_name_pattern,
        })
    }

    /// Process-wide validator instance.
    pub fn shared() -> &'static InputValidator {
        &SHARED
    }

    /// Validate a ledger account id (also used for contract ids)
    pub fn validate_account_id(&self, account_id: &str) -> WalletResult<()> {
        if account_id.len() < MIN_ACCOUNT_ID_LEN {
            return Err(WalletError::InvalidAccountId(format!(
                "'{}' is shorter than {} characters",
                account_id, MIN_ACCOUNT_ID_LEN
            )));
        }

        if account_id.len() > MAX_ACCOUNT_ID_LEN {
            return Err(WalletError::InvalidAccountId(format!(
                "account id longer than {} characters",
                MAX_ACCOUNT_ID_LEN
            )));
        }

        if !self.account_id_pattern.is_match(account_id) {
            return Err(WalletError::InvalidAccountId(format!(
                "'{}' contains invalid characters or separators",
                account_id
            )));
        }

        Ok(())
    }

    /// Validate a contract method name
    pub fn validate_method_name(&self, method_name: &str) -> WalletResult<()> {
        if method_name.is_empty() {
            return Err(WalletError::ValidationError(
                "Method name cannot be empty".to_string(),
            ));
        }

        if method_name.len() > MAX_METHOD_NAME_LEN {
            return Err(WalletError::ValidationError(
                "Method name too long".to_string(),
            ));
        }

        if !self.method_name_pattern.is_match(method_name) {
            return Err(WalletError::ValidationError(format!(
                "Method name '{}' contains invalid characters",
                method_name
            )));
        }

        Ok(())
    }

    /// Validate an endpoint URL. Plain http is only accepted for loopback hosts.
    pub fn validate_endpoint(&self, endpoint: &str) -> WalletResult<Url> {
        let url = Url::parse(endpoint).map_err(|e| {
            WalletError::ValidationError(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if is_loopback(&url) => Ok(url),
            other => Err(WalletError::ValidationError(format!(
                "Endpoint scheme '{}' is not allowed for {}",
                other, endpoint
            ))),
        }
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new().expect("Failed to create InputValidator")
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}
