//! Error types for the mint controller
//!
//! An attempt ends in one of these shapes:
//! - `Submission`: the wallet or RPC rejected the transaction before a signature existed
//! - `MissingSignature`: submission finished without producing a signature
//! - `Confirmation`: the transaction landed but its on-chain execution failed
//! - `Timeout`: no terminal status was observed in the allotted window
//!
//! Sale account reads fail separately with [`StateFetchError`].
//!
//! The classifier only ever sees a [`FailureDetail`], the lowest common
//! denominator of those shapes.

use solana_client::client_error::ClientError;
use solana_sdk::{instruction::InstructionError, pubkey::Pubkey, transaction::TransactionError};
use std::fmt;
use thiserror::Error;

/// Opaque failure value handed to the classifier.
///
/// Carries a structured program error code, a free-text message, both, or
/// neither (a bare timeout).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetail {
    pub code: Option<u32>,
    pub message: Option<String>,
}

impl FailureDetail {
    pub fn new(code: Option<u32>, message: Option<String>) -> Self {
        Self { code, message }
    }

    pub fn code(code: u32) -> Self {
        Self {
            code: Some(code),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
        }
    }

    /// No code and no message.
    pub fn bare() -> Self {
        Self::default()
    }

    pub fn is_bare(&self) -> bool {
        self.code.is_none() && self.message.is_none()
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(msg)) => write!(f, "code {} ({})", code, msg),
            (Some(code), None) => write!(f, "code {}", code),
            (None, Some(msg)) => write!(f, "{}", msg),
            (None, None) => write!(f, "no detail"),
        }
    }
}

impl From<&TransactionError> for FailureDetail {
    fn from(err: &TransactionError) -> Self {
        let code = match err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
            _ => None,
        };
        Self {
            code,
            message: Some(err.to_string()),
        }
    }
}

impl From<&ClientError> for FailureDetail {
    fn from(err: &ClientError) -> Self {
        // Preflight failures surface the program error as a transaction error
        let code = match err.get_transaction_error() {
            Some(TransactionError::InstructionError(_, InstructionError::Custom(code))) => {
                Some(code)
            }
            _ => None,
        };
        Self {
            code,
            message: Some(err.to_string()),
        }
    }
}

/// Failure to produce a sale-state snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateFetchError {
    #[error("RPC unreachable: {0}")]
    Unreachable(String),

    #[error("Sale account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("Failed to decode sale account: {0}")]
    Decode(String),
}

/// Errors produced by the mint pipeline.
#[derive(Error, Debug, Clone)]
pub enum MintError {
    /// Rejected before a transaction identifier existed
    #[error("Submission failed: {0}")]
    Submission(FailureDetail),

    /// Landed on-chain but execution failed
    #[error("Transaction failed on-chain: {0}")]
    Confirmation(FailureDetail),

    #[error("Timed out after {timeout_ms}ms waiting for confirmation")]
    Timeout { timeout_ms: u64 },

    /// Submission completed without yielding a transaction identifier
    #[error("No transaction signature was returned")]
    MissingSignature,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MintError {
    /// Wallet refused or failed to sign.
    pub fn wallet_rejected(reason: impl fmt::Display) -> Self {
        Self::Submission(FailureDetail::message(format!("wallet rejected: {}", reason)))
    }

    pub fn rpc(err: &ClientError) -> Self {
        Self::Submission(FailureDetail::from(err))
    }

    /// Input for the error classifier.
    ///
    /// Configuration failures carry their text; timeouts and missing
    /// signatures carry nothing.
    pub fn detail(&self) -> FailureDetail {
        match self {
            Self::Submission(detail) | Self::Confirmation(detail) => detail.clone(),
            Self::Configuration(msg) => FailureDetail::message(msg.clone()),
            Self::Timeout { .. } | Self::MissingSignature => FailureDetail::bare(),
        }
    }

    /// Error category for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "submission",
            Self::Confirmation(_) => "confirmation",
            Self::Timeout { .. } => "timeout",
            Self::MissingSignature => "missing_signature",
            Self::Configuration(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_from_custom_instruction_error() {
        let err = TransactionError::InstructionError(4, InstructionError::Custom(311));
        let detail = FailureDetail::from(&err);
        assert_eq!(detail.code, Some(311));
        assert!(detail.message.unwrap().contains("0x137"));
    }

    #[test]
    fn test_detail_from_non_custom_error() {
        let detail = FailureDetail::from(&TransactionError::BlockhashNotFound);
        assert_eq!(detail.code, None);
        assert!(detail.message.is_some());
    }

    #[test]
    fn test_timeout_detail_is_bare() {
        assert!(MintError::Timeout { timeout_ms: 30_000 }.detail().is_bare());
        assert!(MintError::MissingSignature.detail().is_bare());
    }

    #[test]
    fn test_error_display() {
        let err = MintError::Timeout { timeout_ms: 500 };
        assert_eq!(
            err.to_string(),
            "Timed out after 500ms waiting for confirmation"
        );

        let err = MintError::Confirmation(FailureDetail::code(312));
        assert_eq!(err.to_string(), "Transaction failed on-chain: code 312");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(MintError::MissingSignature.category(), "missing_signature");
        assert_eq!(MintError::Timeout { timeout_ms: 1 }.category(), "timeout");
        assert_eq!(MintError::wallet_rejected("user declined").category(), "submission");
    }
}
