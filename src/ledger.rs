//! Ledger RPC transport
//!
//! The mint core relies on two contracts only: submit a transaction and get
//! back its signature, and look up the status of a signature. Account reads
//! (for the sale state and the identity gate) and signature subscriptions are
//! separate seams so each can be swapped independently.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use solana_transaction_status::TransactionConfirmationStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::{MintError, StateFetchError};

/// Status of a signature as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    pub slot: u64,
    /// `None` once the block is rooted
    pub confirmations: Option<usize>,
    /// Execution error, if the transaction landed but failed
    pub err: Option<TransactionError>,
    pub confirmation_status: Option<TransactionConfirmationStatus>,
}

impl LedgerStatus {
    /// Whether the transaction is at or above `commitment`
    pub fn satisfies(&self, commitment: CommitmentConfig) -> bool {
        let rooted = self.confirmations.is_none();
        match commitment.commitment {
            CommitmentLevel::Processed => true,
            CommitmentLevel::Confirmed => {
                rooted
                    || matches!(
                        self.confirmation_status,
                        Some(TransactionConfirmationStatus::Confirmed)
                            | Some(TransactionConfirmationStatus::Finalized)
                    )
            }
            CommitmentLevel::Finalized => {
                rooted
                    || matches!(
                        self.confirmation_status,
                        Some(TransactionConfirmationStatus::Finalized)
                    )
            }
        }
    }
}

/// Submit and status-poll primitives
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, MintError>;

    /// `Ok(None)` while the signature is unknown to the ledger
    async fn signature_status(&self, signature: &Signature) -> Result<Option<LedgerStatus>, MintError>;
}

/// Raw account reads
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Returns `(owner, data)` or `None` if the account does not exist
    async fn account(&self, address: &Pubkey) -> Result<Option<(Pubkey, Vec<u8>)>, StateFetchError>;
}

/// Notification pushed by a signature subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureEvent {
    /// Transaction seen by the leader; not yet at any commitment
    Received,
    /// Transaction reached the subscribed commitment
    Processed {
        slot: u64,
        err: Option<TransactionError>,
    },
}

/// Live subscription to one signature.
///
/// Dropping it tears down the forwarding task and the websocket behind it.
pub struct SignatureSubscription {
    events: mpsc::UnboundedReceiver<SignatureEvent>,
    task: Option<JoinHandle<()>>,
}

impl SignatureSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<SignatureEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// `None` once the subscription has closed
    pub async fn next(&mut self) -> Option<SignatureEvent> {
        self.events.recv().await
    }
}

impl Drop for SignatureSubscription {
    fn drop(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Push notifications for signatures
#[async_trait]
pub trait SignatureNotifier: Send + Sync {
    async fn subscribe(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<SignatureSubscription, MintError>;
}

/// JSON-RPC backed ledger
pub struct RpcLedger {
    client: Arc<RpcClient>,
    skip_preflight: bool,
}

impl RpcLedger {
    pub fn new(url: String, timeout: Duration, commitment: CommitmentConfig, skip_preflight: bool) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_timeout_and_commitment(url, timeout, commitment)),
            skip_preflight,
        }
    }

    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }

    pub async fn latest_blockhash(&self) -> Result<Hash, MintError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| MintError::rpc(&e))
    }

    pub async fn minimum_balance_for_rent_exemption(&self, len: usize) -> Result<u64, MintError> {
        self.client
            .get_minimum_balance_for_rent_exemption(len)
            .await
            .map_err(|e| MintError::rpc(&e))
    }
}

#[async_trait]
impl LedgerTransport for RpcLedger {
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, MintError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: self.skip_preflight,
            preflight_commitment: Some(self.client.commitment().commitment),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| MintError::rpc(&e))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<LedgerStatus>, MintError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| MintError::rpc(&e))?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| LedgerStatus {
                slot: status.slot,
                confirmations: status.confirmations,
                err: status.err,
                confirmation_status: status.confirmation_status,
            }))
    }
}

#[async_trait]
impl AccountSource for RpcLedger {
    async fn account(&self, address: &Pubkey) -> Result<Option<(Pubkey, Vec<u8>)>, StateFetchError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(|e| StateFetchError::Unreachable(e.to_string()))?;
        Ok(response.value.map(|account| (account.owner, account.data)))
    }
}

/// Websocket signature subscriptions
#[cfg(feature = "ws-stream")]
pub struct WsSignatureNotifier {
    ws_url: String,
}

#[cfg(feature = "ws-stream")]
impl WsSignatureNotifier {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }
}

#[cfg(feature = "ws-stream")]
#[async_trait]
impl SignatureNotifier for WsSignatureNotifier {
    async fn subscribe(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<SignatureSubscription, MintError> {
        use futures_util::StreamExt;
        use solana_client::nonblocking::pubsub_client::PubsubClient;
        use solana_client::rpc_config::RpcSignatureSubscribeConfig;
        use solana_client::rpc_response::RpcSignatureResult;

        tracing::debug!(signature = %signature, ws_url = %self.ws_url, "Subscribing to signature");

        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| MintError::Submission(crate::errors::FailureDetail::message(e.to_string())))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let signature = *signature;

        let task = tokio::spawn(async move {
            // The stream borrows the client, so both live inside this task
            let (mut notifications, unsubscribe) = match client
                .signature_subscribe(
                    &signature,
                    Some(RpcSignatureSubscribeConfig {
                        commitment: Some(commitment),
                        enable_received_notification: Some(false),
                    }),
                )
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(signature = %signature, error = %e, "Signature subscription failed");
                    return;
                }
            };

            while let Some(response) = notifications.next().await {
                let event = match response.value {
                    RpcSignatureResult::ProcessedSignature(result) => SignatureEvent::Processed {
                        slot: response.context.slot,
                        err: result.err,
                    },
                    RpcSignatureResult::ReceivedSignature(_) => SignatureEvent::Received,
                };
                let terminal = matches!(event, SignatureEvent::Processed { .. });
                if tx.send(event).is_err() || terminal {
                    break;
                }
            }
            unsubscribe().await;
        });

        Ok(SignatureSubscription::new(rx, Some(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(confirmations: Option<usize>, level: Option<TransactionConfirmationStatus>) -> LedgerStatus {
        LedgerStatus {
            slot: 10,
            confirmations,
            err: None,
            confirmation_status: level,
        }
    }

    #[test]
    fn test_processed_satisfies_only_processed() {
        let s = status(Some(0), Some(TransactionConfirmationStatus::Processed));
        assert!(s.satisfies(CommitmentConfig::processed()));
        assert!(!s.satisfies(CommitmentConfig::confirmed()));
        assert!(!s.satisfies(CommitmentConfig::finalized()));
    }

    #[test]
    fn test_confirmed_status() {
        let s = status(Some(5), Some(TransactionConfirmationStatus::Confirmed));
        assert!(s.satisfies(CommitmentConfig::confirmed()));
        assert!(!s.satisfies(CommitmentConfig::finalized()));
    }

    #[test]
    fn test_rooted_satisfies_everything() {
        let s = status(None, None);
        assert!(s.satisfies(CommitmentConfig::finalized()));
        assert!(s.satisfies(CommitmentConfig::confirmed()));
    }

    #[tokio::test]
    async fn test_dropping_subscription_aborts_task() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        drop(SignatureSubscription::new(rx, Some(task)));
        let finished = tokio::time::timeout(Duration::from_secs(1), async {
            while !abort.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(finished.is_ok());
    }
}
