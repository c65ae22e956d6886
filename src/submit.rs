//! Mint submission
//!
//! Builds, signs and sends one mint transaction. A submission either fails
//! before a signature exists, or returns the signature for the confirmation
//! poller to track. A wallet that finishes signing without actually signing
//! yields no signature at all.

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::candy_machine::{build_mint_plan, instructions::mint_account_len, MintRequest};
use crate::errors::MintError;
use crate::ledger::{LedgerTransport, RpcLedger};
use crate::metrics::{metrics, Timer};
use crate::types::SaleState;
use crate::wallet::WalletProvider;

#[async_trait]
pub trait MintSubmitter: Send + Sync {
    /// Submit one mint against `sale`.
    ///
    /// `pass` is the gateway token granted by the identity gate, if the sale
    /// is gated. `Ok(None)` means submission finished without a signature.
    async fn mint_one(
        &self,
        sale: &SaleState,
        payer: Pubkey,
        wallet: &dyn WalletProvider,
        pass: Option<Pubkey>,
    ) -> Result<Option<Signature>, MintError>;
}

/// Submits candy machine v2 mints over JSON-RPC
pub struct RpcMintSubmitter {
    ledger: Arc<RpcLedger>,
    candy_machine_program: Pubkey,
    gateway_program: Pubkey,
}

impl RpcMintSubmitter {
    pub fn new(ledger: Arc<RpcLedger>, candy_machine_program: Pubkey, gateway_program: Pubkey) -> Self {
        Self {
            ledger,
            candy_machine_program,
            gateway_program,
        }
    }

    async fn send_cleanup(&self, cleanup: Transaction) {
        match self.ledger.send_transaction(&cleanup).await {
            Ok(signature) => debug!(signature = %signature, "Cleanup transaction sent"),
            Err(e) => warn!(error = %e, "Cleanup transaction failed"),
        }
    }
}

#[async_trait]
impl MintSubmitter for RpcMintSubmitter {
    #[instrument(skip_all, fields(sale = %sale.id, payer = %payer))]
    async fn mint_one(
        &self,
        sale: &SaleState,
        payer: Pubkey,
        wallet: &dyn WalletProvider,
        pass: Option<Pubkey>,
    ) -> Result<Option<Signature>, MintError> {
        let timer = Timer::new();

        let mint_rent_lamports = self
            .ledger
            .minimum_balance_for_rent_exemption(mint_account_len())
            .await?;
        let plan = build_mint_plan(&MintRequest {
            sale,
            payer,
            candy_machine_program: self.candy_machine_program,
            gateway_program: self.gateway_program,
            gateway_token: pass,
            mint_rent_lamports,
        })?;
        if let Some(pass) = pass {
            debug!(gateway_token = %pass, "Minting with gateway pass");
        }

        let blockhash = self.ledger.latest_blockhash().await?;

        let mut tx = Transaction::new_with_payer(&plan.instructions, Some(&payer));
        let ephemeral: Vec<&Keypair> = plan.signers.iter().collect();
        tx.try_partial_sign(&ephemeral, blockhash)
            .map_err(|e| MintError::Configuration(format!("failed to sign with mint keypairs: {}", e)))?;
        wallet.sign_transaction(&mut tx, blockhash).await?;

        if !tx.is_signed() {
            warn!("Wallet returned an unsigned transaction");
            return Ok(None);
        }

        let cleanup = if plan.cleanup.is_empty() {
            None
        } else {
            let mut cleanup = Transaction::new_with_payer(&plan.cleanup, Some(&payer));
            wallet.sign_transaction(&mut cleanup, blockhash).await?;
            Some(cleanup)
        };

        let signature = self.ledger.send_transaction(&tx).await?;
        timer.observe_duration(&metrics().submit_latency);
        info!(
            signature = %signature,
            mint = %plan.mint,
            elapsed_ms = (timer.elapsed_secs() * 1000.0) as u64,
            "Mint transaction submitted"
        );

        if let Some(cleanup) = cleanup.filter(Transaction::is_signed) {
            self.send_cleanup(cleanup).await;
        }

        Ok(Some(signature))
    }
}
