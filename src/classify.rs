//! Failure classification
//!
//! Maps a [`FailureDetail`] to the message and severity shown to the user.
//! Rules, in priority order:
//! 1. structured program code: sold out / not yet started
//! 2. free-text message: substring match on known on-chain error signatures
//! 3. nothing at all: the transaction timed out
//!
//! Unrecognized codes fall through to the message rules. Pure: no I/O.

use crate::errors::FailureDetail;
use crate::types::Severity;

pub const SOLD_OUT_MESSAGE: &str = "SOLD OUT!";
pub const NOT_STARTED_MESSAGE: &str = "Minting period hasn't started yet.";
pub const INSUFFICIENT_FUNDS_MESSAGE: &str = "Insufficient funds to mint. Please fund your wallet.";
pub const MINT_FAILED_MESSAGE: &str = "Minting failed! Please try again!";
pub const TIMEOUT_MESSAGE: &str = "Transaction Timeout! Please try again.";

/// Submission finished without a signature
pub const NO_SIGNATURE_MESSAGE: &str = "Mint failed! Please try again!";
pub const SUCCESS_MESSAGE: &str = "Congratulations! Mint succeeded!";

/// Candy machine empty (`0x137`)
const SOLD_OUT_CODES: &[u32] = &[311];
/// Candy machine not live (`0x138`)
const NOT_STARTED_CODES: &[u32] = &[312];

const SOLD_OUT_SIGNATURES: &[&str] = &["0x137"];
const INSUFFICIENT_FUNDS_SIGNATURES: &[&str] = &["0x135", "insufficient funds", "insufficient lamports"];

/// User-facing classification of a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub message: &'static str,
    pub severity: Severity,
}

impl Classification {
    fn error(message: &'static str) -> Self {
        Self {
            message,
            severity: Severity::Error,
        }
    }
}

pub fn classify(detail: &FailureDetail) -> Classification {
    if let Some(code) = detail.code {
        if SOLD_OUT_CODES.contains(&code) {
            return Classification::error(SOLD_OUT_MESSAGE);
        }
        if NOT_STARTED_CODES.contains(&code) {
            return Classification::error(NOT_STARTED_MESSAGE);
        }
    }

    if let Some(message) = &detail.message {
        let lowered = message.to_lowercase();
        if SOLD_OUT_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
            return Classification::error(SOLD_OUT_MESSAGE);
        }
        if INSUFFICIENT_FUNDS_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
            return Classification::error(INSUFFICIENT_FUNDS_MESSAGE);
        }
        return Classification::error(MINT_FAILED_MESSAGE);
    }

    Classification::error(TIMEOUT_MESSAGE)
}

/// Client state is stale beyond repair and must be reloaded
pub fn requires_reload(detail: &FailureDetail) -> bool {
    detail.code.is_some_and(|code| SOLD_OUT_CODES.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_codes() {
        assert_eq!(classify(&FailureDetail::code(311)).message, SOLD_OUT_MESSAGE);
        assert_eq!(classify(&FailureDetail::code(312)).message, NOT_STARTED_MESSAGE);
    }

    #[test]
    fn test_code_wins_over_message() {
        let detail = FailureDetail::new(Some(312), Some("custom program error: 0x137".into()));
        assert_eq!(classify(&detail).message, NOT_STARTED_MESSAGE);
    }

    #[test]
    fn test_unknown_code_falls_through_to_message() {
        let detail = FailureDetail::new(Some(1), Some("Attempt to debit an account but found no record of a prior credit: insufficient funds".into()));
        assert_eq!(classify(&detail).message, INSUFFICIENT_FUNDS_MESSAGE);
    }

    #[test]
    fn test_unknown_code_without_message_is_timeout() {
        assert_eq!(classify(&FailureDetail::code(6000)).message, TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_signature_at_start_of_message_matches() {
        // a match at index 0 still counts
        assert_eq!(classify(&FailureDetail::message("0x137")).message, SOLD_OUT_MESSAGE);
    }

    #[test]
    fn test_message_signatures() {
        let detail = FailureDetail::message(
            "Transaction simulation failed: Error processing Instruction 4: custom program error: 0x135",
        );
        assert_eq!(classify(&detail).message, INSUFFICIENT_FUNDS_MESSAGE);

        let detail = FailureDetail::message("Error processing Instruction 4: custom program error: 0x137");
        assert_eq!(classify(&detail).message, SOLD_OUT_MESSAGE);

        let detail = FailureDetail::message("User rejected the request");
        assert_eq!(classify(&detail).message, MINT_FAILED_MESSAGE);
    }

    #[test]
    fn test_bare_is_timeout() {
        let c = classify(&FailureDetail::bare());
        assert_eq!(c.message, TIMEOUT_MESSAGE);
        assert_eq!(c.severity, Severity::Error);
    }

    #[test]
    fn test_requires_reload_only_for_sold_out_code() {
        assert!(requires_reload(&FailureDetail::code(311)));
        assert!(!requires_reload(&FailureDetail::code(312)));
        assert!(!requires_reload(&FailureDetail::message("custom program error: 0x137")));
    }
}
