//! Confirmation poller tests

use solana_sdk::{
    commitment_config::CommitmentConfig, instruction::InstructionError, signature::Signature,
    transaction::TransactionError,
};
use solana_transaction_status::TransactionConfirmationStatus;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::test_helpers::*;
use crate::confirm::{ConfirmationPoller, TerminalStatus};
use crate::ledger::{LedgerStatus, SignatureEvent, SignatureNotifier};

fn poller(ledger: &Arc<MockLedger>, notifier: Option<&Arc<MockNotifier>>) -> ConfirmationPoller {
    ConfirmationPoller::new(
        ledger.clone(),
        notifier.map(|n| n.clone() as Arc<dyn SignatureNotifier>),
        POLL_INTERVAL,
    )
}

#[tokio::test(start_paused = true)]
async fn test_unknown_signature_times_out_within_bound() {
    let ledger = Arc::new(MockLedger::default());
    let notifier = Arc::new(MockNotifier::default());
    let poller = poller(&ledger, Some(&notifier));

    let timeout = Duration::from_millis(7_500);
    let started = Instant::now();
    let status = poller
        .confirm(&Signature::new_unique(), timeout, CommitmentConfig::confirmed())
        .await;

    assert_eq!(status, TerminalStatus::TimedOut);
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < timeout + Duration::from_millis(5));
    // polled at 0, 2, 4 and 6 seconds
    assert_eq!(ledger.polls(), 4);
    assert!(notifier.released().await);
}

#[tokio::test(start_paused = true)]
async fn test_polling_confirms_after_status_appears() {
    let ledger = Arc::new(MockLedger::with_status(confirmed_status()));
    ledger.unknown_polls.store(2, Ordering::SeqCst);
    let poller = poller(&ledger, None);

    let started = Instant::now();
    let status = poller
        .confirm(&Signature::new_unique(), TX_TIMEOUT, CommitmentConfig::confirmed())
        .await;

    assert_eq!(status, TerminalStatus::Confirmed { slot: 42 });
    assert_eq!(ledger.polls(), 3);
    assert!(started.elapsed() >= POLL_INTERVAL * 2);
    assert!(started.elapsed() < POLL_INTERVAL * 2 + Duration::from_millis(5));
}

#[tokio::test(start_paused = true)]
async fn test_processed_status_waits_for_confirmed_commitment() {
    let ledger = Arc::new(MockLedger::with_status(LedgerStatus {
        slot: 7,
        confirmations: Some(0),
        err: None,
        confirmation_status: Some(TransactionConfirmationStatus::Processed),
    }));
    let poller = poller(&ledger, None);

    let status = poller
        .confirm(
            &Signature::new_unique(),
            Duration::from_millis(5_000),
            CommitmentConfig::confirmed(),
        )
        .await;
    assert_eq!(status, TerminalStatus::TimedOut);

    let status = poller
        .confirm(
            &Signature::new_unique(),
            Duration::from_millis(5_000),
            CommitmentConfig::processed(),
        )
        .await;
    assert_eq!(status, TerminalStatus::Confirmed { slot: 7 });
}

#[tokio::test(start_paused = true)]
async fn test_on_chain_error_carries_program_code() {
    let ledger = Arc::new(MockLedger::with_status(failed_status(
        TransactionError::InstructionError(4, InstructionError::Custom(311)),
    )));
    let poller = poller(&ledger, None);

    let status = poller
        .confirm(&Signature::new_unique(), TX_TIMEOUT, CommitmentConfig::finalized())
        .await;

    let TerminalStatus::Failed { slot, detail } = status else {
        panic!("expected on-chain failure, got {:?}", status);
    };
    assert_eq!(slot, 42);
    assert_eq!(detail.code, Some(311));
    assert!(detail.message.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_notification_confirms_before_next_poll() {
    let ledger = Arc::new(MockLedger::default());
    let notifier = Arc::new(MockNotifier::default());
    let poller = poller(&ledger, Some(&notifier));
    let signature = Signature::new_unique();

    let sender = {
        let notifier = notifier.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let senders = notifier.senders.lock();
            let _ = senders[0].send(SignatureEvent::Received);
            let _ = senders[0].send(SignatureEvent::Processed { slot: 77, err: None });
        }
    };
    let started = Instant::now();
    let (status, _) = tokio::join!(
        poller.confirm(&signature, TX_TIMEOUT, CommitmentConfig::confirmed()),
        sender
    );

    assert_eq!(status, TerminalStatus::Confirmed { slot: 77 });
    assert!(started.elapsed() < POLL_INTERVAL);
    assert!(notifier.released().await);
}

#[tokio::test(start_paused = true)]
async fn test_notification_with_error_is_failure() {
    let ledger = Arc::new(MockLedger::default());
    let notifier = Arc::new(MockNotifier::with_initial(SignatureEvent::Processed {
        slot: 5,
        err: Some(TransactionError::InstructionError(2, InstructionError::Custom(312))),
    }));
    let poller = poller(&ledger, Some(&notifier));

    let status = poller
        .confirm(&Signature::new_unique(), TX_TIMEOUT, CommitmentConfig::confirmed())
        .await;

    assert!(matches!(status, TerminalStatus::Failed { detail, .. } if detail.code == Some(312)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_subscription_falls_back_to_polling() {
    let ledger = Arc::new(MockLedger::with_status(confirmed_status()));
    let notifier = Arc::new(MockNotifier::default());
    notifier.fail.store(true, Ordering::SeqCst);
    let poller = poller(&ledger, Some(&notifier));

    let status = poller
        .confirm(&Signature::new_unique(), TX_TIMEOUT, CommitmentConfig::confirmed())
        .await;

    assert_eq!(status, TerminalStatus::Confirmed { slot: 42 });
    assert_eq!(notifier.subscriptions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_subscription_keeps_polling() {
    let ledger = Arc::new(MockLedger::with_status(confirmed_status()));
    ledger.unknown_polls.store(1, Ordering::SeqCst);
    let notifier = Arc::new(MockNotifier::default());
    let poller = poller(&ledger, Some(&notifier));
    let signature = Signature::new_unique();

    let closer = {
        let notifier = notifier.clone();
        async move {
            tokio::task::yield_now().await;
            notifier.senders.lock().clear();
        }
    };
    let (status, _) = tokio::join!(
        poller.confirm(&signature, TX_TIMEOUT, CommitmentConfig::confirmed()),
        closer
    );

    assert_eq!(status, TerminalStatus::Confirmed { slot: 42 });
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_errors_are_tolerated() {
    let ledger = Arc::new(MockLedger::with_status(confirmed_status()));
    ledger.failing_polls.store(2, Ordering::SeqCst);
    let poller = poller(&ledger, None);

    let status = poller
        .confirm(&Signature::new_unique(), TX_TIMEOUT, CommitmentConfig::confirmed())
        .await;

    assert_eq!(status, TerminalStatus::Confirmed { slot: 42 });
    assert_eq!(ledger.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_is_clamped() {
    let ledger = Arc::new(MockLedger::with_status(confirmed_status()));
    ledger.unknown_polls.store(3, Ordering::SeqCst);
    let poller = ConfirmationPoller::new(ledger.clone(), None, Duration::ZERO);

    let status = poller
        .confirm(&Signature::new_unique(), TX_TIMEOUT, CommitmentConfig::confirmed())
        .await;

    assert_eq!(status, TerminalStatus::Confirmed { slot: 42 });
    assert_eq!(ledger.polls(), 4);
}
