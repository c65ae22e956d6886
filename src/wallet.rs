//! Wallet provider
//!
//! The mint core only depends on three wallet capabilities: whether it is
//! connected, its public key, and transaction signing. [`KeypairWallet`] is
//! the file-backed implementation used by the front-end; it can be connected
//! and disconnected at runtime.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::sync::Arc;

use crate::errors::MintError;

/// Capabilities the mint core needs from a wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn connected(&self) -> bool;

    /// `None` while disconnected
    fn public_key(&self) -> Option<Pubkey>;

    /// Add the wallet's signature to `tx`, keeping signatures already present
    async fn sign_transaction(&self, tx: &mut Transaction, recent_blockhash: Hash) -> Result<(), MintError>;
}

/// Keypair-backed wallet
#[derive(Clone, Default)]
pub struct KeypairWallet {
    keypair: Arc<RwLock<Option<Arc<Keypair>>>>,
}

impl KeypairWallet {
    /// Load a keypair file (64 raw bytes or the JSON byte array written by `solana-keygen`)
    pub fn from_file(path: &str) -> Result<Self> {
        Ok(Self::from_keypair(load_keypair(path)?))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(RwLock::new(Some(Arc::new(keypair)))),
        }
    }

    /// A wallet with nothing connected yet
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connect(&self, keypair: Keypair) {
        *self.keypair.write() = Some(Arc::new(keypair));
    }

    pub fn disconnect(&self) {
        *self.keypair.write() = None;
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    fn connected(&self) -> bool {
        self.keypair.read().is_some()
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.read().as_ref().map(|k| k.pubkey())
    }

    async fn sign_transaction(&self, tx: &mut Transaction, recent_blockhash: Hash) -> Result<(), MintError> {
        let keypair = self
            .keypair
            .read()
            .clone()
            .ok_or_else(|| MintError::wallet_rejected("wallet disconnected"))?;
        tx.try_partial_sign(&[keypair.as_ref()], recent_blockhash)
            .map_err(MintError::wallet_rejected)
    }
}

/// Read a keypair file, expanding a leading `~/`
pub fn load_keypair(path: &str) -> Result<Keypair> {
    let path = expand_home(path);
    let keypair_bytes = std::fs::read(&path)
        .with_context(|| format!("Failed to read keypair file: {}", path))?;

    let bytes = if keypair_bytes.len() == 64 {
        keypair_bytes
    } else {
        serde_json::from_slice::<Vec<u8>>(&keypair_bytes)
            .context("Failed to parse keypair JSON")?
    };
    if bytes.len() != 64 {
        anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home, rest),
        _ => path.to_string(),
    }
}
