//! Candy machine mint controller
//!
//! Turns a user's mint trigger into a submitted candy machine v2 transaction,
//! tracks it to a terminal status under a deadline, classifies failures into
//! user-facing messages, and optionally routes the trigger through an
//! identity gate first.

pub mod alert;
pub mod candy_machine;
pub mod classify;
pub mod config;
pub mod confirm;
pub mod errors;
pub mod gate;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod sale_state;
pub mod submit;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use errors::{FailureDetail, MintError, StateFetchError};
pub use orchestrator::{MintOrchestrator, OrchestratorConfig, OrchestratorEvent, TriggerResult};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use types::{AlertState, MintOutcome, MintPhase, SaleState, Severity, View};

#[cfg(test)]
mod tests {
    mod confirm_tests;
    mod orchestrator_tests;
    mod test_helpers;
}
