//! Common types used throughout the mint controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use uuid::Uuid;

/// Identity-verification requirement attached to a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatekeeperSettings {
    /// Gatekeeper network the wallet must hold a pass for
    pub network: Pubkey,

    /// Pass is consumed by the mint
    pub expire_on_use: bool,
}

/// When a sale stops accepting mints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndSettings {
    /// Unix timestamp after which minting stops
    Date(i64),
    /// Redeemed item count at which minting stops
    Amount(u64),
}

/// Decoded snapshot of one sale.
///
/// Snapshots are never mutated in place: every refresh builds a new one that
/// replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    /// Candy machine account address
    pub id: Pubkey,

    /// Whether minting is currently permitted
    pub is_active: bool,

    pub is_sold_out: bool,

    pub go_live_date: Option<DateTime<Utc>>,

    /// Present only when the sale requires identity gating
    pub gatekeeper: Option<GatekeeperSettings>,

    /// Account receiving mint proceeds
    pub treasury: Pubkey,

    /// SPL token used for payment instead of SOL
    pub token_mint: Option<Pubkey>,

    /// Price in lamports (or base units of `token_mint`)
    pub price: u64,

    pub items_available: u64,
    pub items_redeemed: u64,
    pub items_remaining: u64,

    pub end_settings: Option<EndSettings>,

    /// Sale carries whitelist mint settings
    pub has_whitelist: bool,
}

impl SaleState {
    pub fn requires_gate(&self) -> bool {
        self.gatekeeper.is_some()
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
    #[default]
    None,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::None => "none",
        };
        f.write_str(s)
    }
}

/// User-visible notification. At most one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub visible: bool,
    pub message: String,
    pub severity: Severity,
}

impl AlertState {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn shown(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            visible: true,
            message: message.into(),
            severity,
        }
    }
}

/// Outcome of a single mint attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Success,
    Failure,
}

/// One user-initiated mint action.
#[derive(Debug, Clone)]
pub struct MintAttempt {
    /// Correlation id for logs
    pub id: Uuid,

    pub is_in_flight: bool,

    transaction_id: Option<Signature>,

    pub outcome: AttemptOutcome,
}

impl MintAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            is_in_flight: true,
            transaction_id: None,
            outcome: AttemptOutcome::Pending,
        }
    }

    pub fn transaction_id(&self) -> Option<Signature> {
        self.transaction_id
    }

    /// Records the submitted signature.
    ///
    /// Returns `false` and leaves the attempt untouched if a signature is
    /// already recorded.
    pub fn record_transaction_id(&mut self, signature: Signature) -> bool {
        if self.transaction_id.is_some() {
            return false;
        }
        self.transaction_id = Some(signature);
        true
    }

    /// Moves the attempt to its terminal outcome and clears the in-flight flag
    pub fn resolve(&mut self, success: bool) {
        self.outcome = if success {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        self.is_in_flight = false;
    }
}

impl Default for MintAttempt {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal result shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    Success { signature: Signature },
    Failure { message: String, reload: bool },
}

impl MintOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MintOutcome::Success { .. })
    }
}

/// Orchestrator state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MintPhase {
    #[default]
    Idle,
    Submitting {
        attempt_id: Uuid,
    },
    AwaitingConfirmation {
        attempt_id: Uuid,
        signature: Signature,
    },
    Resolved {
        attempt_id: Uuid,
        outcome: MintOutcome,
    },
}

impl MintPhase {
    pub fn attempt_id(&self) -> Option<Uuid> {
        match self {
            MintPhase::Idle => None,
            MintPhase::Submitting { attempt_id }
            | MintPhase::AwaitingConfirmation { attempt_id, .. }
            | MintPhase::Resolved { attempt_id, .. } => Some(*attempt_id),
        }
    }
}

/// Mint button label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintButtonState {
    SoldOut,
    Minting,
    Mint,
    /// Not live yet, ended, or state not loaded
    Unavailable,
}

/// What the front-end should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Wallet disconnected: only the connect affordance is reachable
    ConnectWallet,
    MintPanel {
        sale: Option<SaleState>,
        button: MintButtonState,
        /// Identity gate wraps the mint button
        gated: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_set_once() {
        let mut attempt = MintAttempt::new();
        let first = Signature::new_unique();
        assert!(attempt.record_transaction_id(first));
        assert!(!attempt.record_transaction_id(Signature::new_unique()));
        assert_eq!(attempt.transaction_id(), Some(first));
    }

    #[test]
    fn test_resolve_clears_in_flight() {
        let mut attempt = MintAttempt::new();
        assert!(attempt.is_in_flight);
        attempt.resolve(false);
        assert!(!attempt.is_in_flight);
        assert_eq!(attempt.outcome, AttemptOutcome::Failure);
    }

    #[test]
    fn test_phase_attempt_id() {
        let id = Uuid::new_v4();
        assert_eq!(MintPhase::Idle.attempt_id(), None);
        assert_eq!(MintPhase::Submitting { attempt_id: id }.attempt_id(), Some(id));
    }
}
