//! Confirmation polling
//!
//! Tracks a submitted signature to exactly one terminal status: confirmed,
//! confirmed with an on-chain error, or timed out. A websocket subscription
//! and a fixed-interval status poll race each other; whichever observes a
//! terminal status first wins. Both are owned by the confirmation future, so
//! every exit (including the deadline dropping it) releases them.

use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::errors::FailureDetail;
use crate::ledger::{LedgerStatus, LedgerTransport, SignatureEvent, SignatureNotifier, SignatureSubscription};
use crate::metrics::{metrics, Timer};

/// How a submitted transaction ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Confirmed { slot: u64 },
    /// Landed, but on-chain execution failed
    Failed { slot: u64, detail: FailureDetail },
    /// No terminal status before the deadline
    TimedOut,
}

impl TerminalStatus {
    fn from_status(status: &LedgerStatus, commitment: CommitmentConfig) -> Option<Self> {
        if let Some(err) = &status.err {
            return Some(Self::Failed {
                slot: status.slot,
                detail: FailureDetail::from(err),
            });
        }
        status
            .satisfies(commitment)
            .then_some(Self::Confirmed { slot: status.slot })
    }
}

/// Floor for the status poll period; `interval` rejects zero
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Drives a signature to a terminal status under a deadline
pub struct ConfirmationPoller {
    ledger: Arc<dyn LedgerTransport>,
    notifier: Option<Arc<dyn SignatureNotifier>>,
    poll_interval: Duration,
}

impl ConfirmationPoller {
    pub fn new(
        ledger: Arc<dyn LedgerTransport>,
        notifier: Option<Arc<dyn SignatureNotifier>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            notifier,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Wait for `signature` to reach `commitment`, for at most `timeout`
    #[instrument(skip(self, signature), fields(signature = %signature))]
    pub async fn confirm(
        &self,
        signature: &Signature,
        timeout: Duration,
        commitment: CommitmentConfig,
    ) -> TerminalStatus {
        let timer = Timer::new();
        let started = Instant::now();

        let status = match tokio::time::timeout(timeout, self.watch(signature, commitment)).await {
            Ok(status) => status,
            Err(_) => TerminalStatus::TimedOut,
        };

        timer.observe_duration(&metrics().confirmation_latency);
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = ?status,
            "Confirmation finished"
        );
        status
    }

    async fn watch(&self, signature: &Signature, commitment: CommitmentConfig) -> TerminalStatus {
        let mut subscription = self.subscribe(signature, commitment).await;

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = next_event(&mut subscription) => match event {
                    Some(SignatureEvent::Processed { slot, err }) => {
                        debug!(slot, "Signature notification received");
                        return match err {
                            Some(err) => TerminalStatus::Failed { slot, detail: FailureDetail::from(&err) },
                            None => TerminalStatus::Confirmed { slot },
                        };
                    }
                    Some(SignatureEvent::Received) => {}
                    None => {
                        debug!("Signature subscription closed, continuing with polling only");
                        subscription = None;
                    }
                },
                _ = ticker.tick() => match self.ledger.signature_status(signature).await {
                    Ok(Some(status)) => {
                        if let Some(terminal) = TerminalStatus::from_status(&status, commitment) {
                            return terminal;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "Signature status poll failed"),
                },
            }
        }
    }

    async fn subscribe(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Option<SignatureSubscription> {
        let notifier = self.notifier.as_ref()?;
        match notifier.subscribe(signature, commitment).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(error = %e, "Could not subscribe to signature, polling only");
                None
            }
        }
    }
}

async fn next_event(subscription: &mut Option<SignatureSubscription>) -> Option<SignatureEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
