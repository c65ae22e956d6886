//! Mint orchestrator
//!
//! Explicit state machine behind the mint button:
//!
//! ```text
//! Idle -> Submitting -> AwaitingConfirmation -> Resolved(success | failure) -> Idle
//!            \______________________________________/
//!                   submission failure
//! ```
//!
//! A trigger is serialized by a synchronous try-lock taken before the first
//! await, so a second trigger can never slip in while the identity gate is
//! pending. The in-flight flag is raised only once the gate grants passage
//! and is lowered by a scope guard on every exit path, cancellation included.
//! `Resolved` returns to `Idle` after the display duration, on explicit
//! acknowledgement, or when the next trigger arrives.

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::alert::AlertChannel;
use crate::classify::{classify, requires_reload, NO_SIGNATURE_MESSAGE, SUCCESS_MESSAGE};
use crate::confirm::{ConfirmationPoller, TerminalStatus};
use crate::errors::MintError;
use crate::gate::{GateDecision, IdentityGate};
use crate::metrics::metrics;
use crate::sale_state::SaleStateSource;
use crate::submit::MintSubmitter;
use crate::types::{MintAttempt, MintButtonState, MintOutcome, MintPhase, SaleState, Severity, View};
use crate::wallet::WalletProvider;

/// Timing and commitment knobs
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Upper bound on waiting for a terminal status
    pub tx_timeout: Duration,
    pub commitment: CommitmentConfig,
    /// How long `Resolved` is shown before returning to `Idle`
    pub display_duration: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tx_timeout: Duration::from_millis(30_000),
            commitment: CommitmentConfig::confirmed(),
            display_duration: Duration::from_millis(6_000),
        }
    }
}

/// Inputs the front-end feeds to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEvent {
    Mounted,
    WalletChanged,
    SaleChanged(Pubkey),
    MintRequested,
    AlertDismissed,
}

/// Why a trigger did not start an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    WalletDisconnected,
    StateNotLoaded,
    SaleInactive,
    SoldOut,
    AttemptInFlight,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rejection::WalletDisconnected => "wallet disconnected",
            Rejection::StateNotLoaded => "sale state not loaded",
            Rejection::SaleInactive => "sale not active",
            Rejection::SoldOut => "sold out",
            Rejection::AttemptInFlight => "attempt already in flight",
        };
        f.write_str(s)
    }
}

/// Result of a mint trigger
#[derive(Debug, Clone)]
pub enum TriggerResult {
    /// Preconditions failed; nothing was dispatched
    Rejected(Rejection),
    /// Identity gate withheld passage; nothing was dispatched
    GateWithheld,
    /// An attempt ran to its terminal outcome
    Completed {
        attempt: MintAttempt,
        outcome: MintOutcome,
    },
}

impl TriggerResult {
    pub fn outcome(&self) -> Option<&MintOutcome> {
        match self {
            TriggerResult::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

pub struct MintOrchestrator {
    wallet: Arc<dyn WalletProvider>,
    sales: Arc<dyn SaleStateSource>,
    gate: Arc<dyn IdentityGate>,
    submitter: Arc<dyn MintSubmitter>,
    poller: ConfirmationPoller,
    alerts: AlertChannel,
    config: OrchestratorConfig,

    sale_id: RwLock<Option<Pubkey>>,
    sale_state: ArcSwapOption<SaleState>,

    in_flight: Arc<AtomicBool>,
    trigger: Mutex<()>,
    phase: Arc<watch::Sender<MintPhase>>,
}

impl MintOrchestrator {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        sales: Arc<dyn SaleStateSource>,
        gate: Arc<dyn IdentityGate>,
        submitter: Arc<dyn MintSubmitter>,
        poller: ConfirmationPoller,
        alerts: AlertChannel,
        config: OrchestratorConfig,
    ) -> Self {
        let (phase, _) = watch::channel(MintPhase::Idle);
        Self {
            wallet,
            sales,
            gate,
            submitter,
            poller,
            alerts,
            config,
            sale_id: RwLock::new(None),
            sale_state: ArcSwapOption::empty(),
            in_flight: Arc::new(AtomicBool::new(false)),
            trigger: Mutex::new(()),
            phase: Arc::new(phase),
        }
    }

    /// Set the sale without fetching it
    pub fn with_sale(self, sale_id: Pubkey) -> Self {
        *self.sale_id.write() = Some(sale_id);
        self
    }

    pub fn alerts(&self) -> &AlertChannel {
        &self.alerts
    }

    pub fn sale_id(&self) -> Option<Pubkey> {
        *self.sale_id.read()
    }

    /// Latest sale snapshot, if any
    pub fn sale_state(&self) -> Option<Arc<SaleState>> {
        self.sale_state.load_full()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Shared handle to the in-flight flag
    pub fn in_flight_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.in_flight)
    }

    pub fn phase(&self) -> MintPhase {
        self.phase.borrow().clone()
    }

    /// Dispatch one front-end event.
    ///
    /// Returns the trigger result for `MintRequested`, `None` otherwise.
    pub async fn handle_event(&self, event: OrchestratorEvent) -> Option<TriggerResult> {
        debug!(event = ?event, "Handling event");
        match event {
            OrchestratorEvent::Mounted | OrchestratorEvent::WalletChanged => {
                self.refresh_sale_state().await;
                None
            }
            OrchestratorEvent::SaleChanged(sale_id) => {
                let changed = self.sale_id.write().replace(sale_id) != Some(sale_id);
                if changed {
                    self.sale_state.store(None);
                }
                self.refresh_sale_state().await;
                None
            }
            OrchestratorEvent::MintRequested => Some(self.mint().await),
            OrchestratorEvent::AlertDismissed => {
                self.alerts.dismiss();
                self.acknowledge();
                None
            }
        }
    }

    /// Re-read the sale and replace the snapshot.
    ///
    /// No-op without a connected wallet or a sale id. On failure the prior
    /// snapshot is kept.
    #[instrument(skip(self))]
    pub async fn refresh_sale_state(&self) -> Option<Arc<SaleState>> {
        if !self.wallet.connected() {
            debug!("Wallet disconnected, skipping sale state refresh");
            return None;
        }
        let sale_id = self.sale_id()?;

        match self.sales.fetch(&sale_id, self.wallet.as_ref()).await {
            Ok(state) => {
                metrics().state_refreshes.inc();
                if self.sale_id() != Some(sale_id) {
                    debug!(sale = %sale_id, "Sale changed during refresh, discarding snapshot");
                    return None;
                }
                let state = Arc::new(state);
                self.sale_state.store(Some(Arc::clone(&state)));
                if state.has_whitelist {
                    debug!(sale = %sale_id, "Sale has whitelist settings; charging full price");
                }
                Some(state)
            }
            Err(e) => {
                metrics().state_refresh_failures.inc();
                warn!(sale = %sale_id, error = %e, "Sale state refresh failed, keeping previous state");
                None
            }
        }
    }

    /// Return a `Resolved` machine to `Idle`
    pub fn acknowledge(&self) {
        self.phase.send_if_modified(|phase| {
            if matches!(phase, MintPhase::Resolved { .. }) {
                *phase = MintPhase::Idle;
                true
            } else {
                false
            }
        });
    }

    /// What the front-end should render right now
    pub fn view(&self) -> View {
        if !self.wallet.connected() {
            return View::ConnectWallet;
        }
        let sale = self.sale_state.load_full();
        let button = match sale.as_deref() {
            None => MintButtonState::Unavailable,
            Some(s) if s.is_sold_out => MintButtonState::SoldOut,
            Some(_) if self.is_in_flight() || self.trigger.try_lock().is_err() => MintButtonState::Minting,
            Some(s) if s.is_active => MintButtonState::Mint,
            Some(_) => MintButtonState::Unavailable,
        };
        let gated = sale.as_deref().is_some_and(|s| s.is_active && s.requires_gate());
        View::MintPanel {
            sale: sale.map(|s| (*s).clone()),
            button,
            gated,
        }
    }

    /// Handle a mint trigger
    pub async fn mint(&self) -> TriggerResult {
        let Ok(trigger) = self.trigger.try_lock() else {
            debug!("Mint trigger ignored, another trigger is running");
            return TriggerResult::Rejected(Rejection::AttemptInFlight);
        };
        if self.is_in_flight() {
            return TriggerResult::Rejected(Rejection::AttemptInFlight);
        }

        let Some(payer) = self.wallet.public_key().filter(|_| self.wallet.connected()) else {
            return TriggerResult::Rejected(Rejection::WalletDisconnected);
        };
        // the attempt keeps this snapshot even if a refresh lands meanwhile
        let Some(sale) = self.sale_state.load_full() else {
            return TriggerResult::Rejected(Rejection::StateNotLoaded);
        };
        if sale.is_sold_out {
            return TriggerResult::Rejected(Rejection::SoldOut);
        }
        if !sale.is_active {
            return TriggerResult::Rejected(Rejection::SaleInactive);
        }

        self.acknowledge();

        let pass = match &sale.gatekeeper {
            Some(gatekeeper) => match self.gate.request_passage(&gatekeeper.network, self.wallet.as_ref()).await {
                GateDecision::Granted { gateway_token } => Some(gateway_token),
                GateDecision::Withheld => {
                    metrics().gate_withheld.inc();
                    info!(network = %gatekeeper.network, "Identity gate withheld passage");
                    return TriggerResult::GateWithheld;
                }
            },
            None => None,
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return TriggerResult::Rejected(Rejection::AttemptInFlight);
        }

        let mut attempt = MintAttempt::new();
        let attempt_id = attempt.id;
        metrics().mints_in_flight.inc();
        metrics().mint_attempts.inc();

        let guard = scopeguard::guard(
            (Arc::clone(&self.in_flight), Arc::clone(&self.phase)),
            move |(flag, phase)| {
                flag.store(false, Ordering::SeqCst);
                metrics().mints_in_flight.dec();
                // an attempt dropped mid-way leaves no half-finished phase behind
                phase.send_if_modified(|p| {
                    let stale = p.attempt_id() == Some(attempt_id) && !matches!(p, MintPhase::Resolved { .. });
                    if stale {
                        *p = MintPhase::Idle;
                    }
                    stale
                });
            },
        );

        let span = info_span!("mint_attempt", attempt_id = %attempt_id, sale = %sale.id);
        let outcome = self
            .run_attempt(&mut attempt, &sale, payer, pass)
            .instrument(span)
            .await;

        attempt.resolve(outcome.is_success());
        self.publish(attempt_id, &outcome);
        drop(guard);
        drop(trigger);

        if let MintOutcome::Failure { reload: true, .. } = &outcome {
            metrics().state_reloads.inc();
            info!(attempt_id = %attempt_id, "Sale sold out, reloading state");
            self.refresh_sale_state().await;
        }

        TriggerResult::Completed { attempt, outcome }
    }

    async fn run_attempt(
        &self,
        attempt: &mut MintAttempt,
        sale: &SaleState,
        payer: Pubkey,
        pass: Option<Pubkey>,
    ) -> MintOutcome {
        self.phase.send_replace(MintPhase::Submitting {
            attempt_id: attempt.id,
        });
        info!(payer = %payer, price = sale.price, "Submitting mint");

        let signature = match self
            .submitter
            .mint_one(sale, payer, self.wallet.as_ref(), pass)
            .await
        {
            Ok(Some(signature)) => signature,
            Ok(None) => {
                let err = MintError::MissingSignature;
                warn!(error = %err, category = err.category(), "Mint submission failed");
                return failure(&err);
            }
            Err(e) => {
                warn!(error = %e, category = e.category(), "Mint submission failed");
                return failure(&e);
            }
        };

        attempt.record_transaction_id(signature);
        self.phase.send_replace(MintPhase::AwaitingConfirmation {
            attempt_id: attempt.id,
            signature,
        });

        self.await_confirmation(signature).await
    }

    async fn await_confirmation(&self, signature: Signature) -> MintOutcome {
        match self
            .poller
            .confirm(&signature, self.config.tx_timeout, self.config.commitment)
            .await
        {
            TerminalStatus::Confirmed { slot } => {
                info!(signature = %signature, slot, "Mint confirmed");
                MintOutcome::Success { signature }
            }
            TerminalStatus::Failed { slot, detail } => {
                let err = MintError::Confirmation(detail);
                warn!(signature = %signature, slot, error = %err, "Mint failed on-chain");
                failure(&err)
            }
            TerminalStatus::TimedOut => {
                metrics().mint_timeouts.inc();
                let err = MintError::Timeout {
                    timeout_ms: self.config.tx_timeout.as_millis() as u64,
                };
                warn!(signature = %signature, error = %err, "Mint confirmation timed out");
                failure(&err)
            }
        }
    }

    fn publish(&self, attempt_id: Uuid, outcome: &MintOutcome) {
        match outcome {
            MintOutcome::Success { .. } => {
                metrics().mint_success.inc();
                self.alerts.raise(SUCCESS_MESSAGE, Severity::Success);
            }
            MintOutcome::Failure { message, .. } => {
                metrics().mint_failed.inc();
                self.alerts.raise(message.as_str(), Severity::Error);
            }
        }

        self.phase.send_replace(MintPhase::Resolved {
            attempt_id,
            outcome: outcome.clone(),
        });

        let phase = Arc::clone(&self.phase);
        let display = self.config.display_duration;
        tokio::spawn(async move {
            tokio::time::sleep(display).await;
            phase.send_if_modified(|p| {
                let expired = matches!(p, MintPhase::Resolved { attempt_id: id, .. } if *id == attempt_id);
                if expired {
                    *p = MintPhase::Idle;
                }
                expired
            });
        });
    }
}

fn failure(err: &MintError) -> MintOutcome {
    if let MintError::MissingSignature = err {
        return MintOutcome::Failure {
            message: NO_SIGNATURE_MESSAGE.to_string(),
            reload: false,
        };
    }
    let detail = err.detail();
    MintOutcome::Failure {
        message: classify(&detail).message.to_string(),
        reload: requires_reload(&detail),
    }
}
