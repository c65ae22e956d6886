//! Identity gate
//!
//! Sales with a gatekeeper network only admit wallets holding a valid
//! gateway token for that network. The gate either grants passage, yielding
//! the token account the mint instruction must reference, or withholds it.
//! A withheld pass is not an error: the orchestrator stays idle and raises
//! nothing.

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::candy_machine::gateway_token_address;
use crate::errors::StateFetchError;
use crate::ledger::AccountSource;
use crate::wallet::WalletProvider;

/// Outcome of a gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Granted { gateway_token: Pubkey },
    Withheld,
}

#[async_trait]
pub trait IdentityGate: Send + Sync {
    async fn request_passage(&self, network: &Pubkey, wallet: &dyn WalletProvider) -> GateDecision;
}

/// Lifecycle state of a gateway token
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub enum GatewayTokenState {
    Active,
    Frozen,
    Revoked,
}

/// Decoded gateway token account
#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct GatewayToken {
    pub features: u8,
    pub parent_gateway_token: Option<Pubkey>,
    pub owner_wallet: Pubkey,
    pub owner_identity: Option<Pubkey>,
    pub gatekeeper_network: Pubkey,
    pub issuing_gatekeeper: Pubkey,
    pub state: GatewayTokenState,
    /// Unix timestamp
    pub expire_time: Option<i64>,
}

impl GatewayToken {
    /// Decode a gateway token account; trailing bytes are ignored
    pub fn decode(data: &[u8]) -> Result<Self, StateFetchError> {
        Self::deserialize(&mut &data[..])
            .map_err(|e| StateFetchError::Decode(format!("invalid gateway token: {}", e)))
    }

    /// Active, unexpired, and issued for `wallet` on `network`
    pub fn is_valid_for(&self, wallet: &Pubkey, network: &Pubkey, now: i64) -> bool {
        self.state == GatewayTokenState::Active
            && self.owner_wallet == *wallet
            && self.gatekeeper_network == *network
            && self.expire_time.map_or(true, |expiry| expiry > now)
    }
}

/// Gate backed by on-chain gateway tokens
pub struct GatewayTokenGate {
    accounts: Arc<dyn AccountSource>,
    gateway_program: Pubkey,
}

impl GatewayTokenGate {
    pub fn new(accounts: Arc<dyn AccountSource>, gateway_program: Pubkey) -> Self {
        Self {
            accounts,
            gateway_program,
        }
    }
}

#[async_trait]
impl IdentityGate for GatewayTokenGate {
    async fn request_passage(&self, network: &Pubkey, wallet: &dyn WalletProvider) -> GateDecision {
        let Some(owner) = wallet.public_key() else {
            return GateDecision::Withheld;
        };
        let address = gateway_token_address(&owner, network, &self.gateway_program);

        let token = match self.accounts.account(&address).await {
            Ok(Some((account_owner, data))) if account_owner == self.gateway_program => {
                GatewayToken::decode(&data)
            }
            Ok(Some((account_owner, _))) => {
                warn!(token = %address, owner = %account_owner, "Gateway token has unexpected owner");
                return GateDecision::Withheld;
            }
            Ok(None) => {
                info!(wallet = %owner, network = %network, "No gateway token, verification required");
                return GateDecision::Withheld;
            }
            Err(e) => {
                warn!(token = %address, error = %e, "Gateway token lookup failed");
                return GateDecision::Withheld;
            }
        };

        match token {
            Ok(token) if token.is_valid_for(&owner, network, Utc::now().timestamp()) => {
                debug!(token = %address, "Gateway token valid");
                GateDecision::Granted {
                    gateway_token: address,
                }
            }
            Ok(token) => {
                info!(
                    token = %address,
                    state = ?token.state,
                    expire_time = ?token.expire_time,
                    "Gateway token not usable"
                );
                GateDecision::Withheld
            }
            Err(e) => {
                warn!(token = %address, error = %e, "Gateway token undecodable");
                GateDecision::Withheld
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candy_machine::GATEWAY_PROGRAM_ID;
    use crate::wallet::KeypairWallet;
    use parking_lot::Mutex;
    use solana_sdk::signature::{Keypair, Signer};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Accounts(Mutex<HashMap<Pubkey, (Pubkey, Vec<u8>)>>);

    #[async_trait]
    impl AccountSource for Accounts {
        async fn account(&self, address: &Pubkey) -> Result<Option<(Pubkey, Vec<u8>)>, StateFetchError> {
            Ok(self.0.lock().get(address).cloned())
        }
    }

    fn token_bytes(wallet: &Pubkey, network: &Pubkey, state: GatewayTokenState, expire_time: Option<i64>) -> Vec<u8> {
        borsh::to_vec(&GatewayToken {
            features: 0,
            parent_gateway_token: None,
            owner_wallet: *wallet,
            owner_identity: None,
            gatekeeper_network: *network,
            issuing_gatekeeper: Pubkey::new_unique(),
            state,
            expire_time,
        })
        .unwrap()
    }

    fn setup(state: GatewayTokenState, expire_time: Option<i64>) -> (GatewayTokenGate, KeypairWallet, Pubkey) {
        let keypair = Keypair::new();
        let owner = keypair.pubkey();
        let network = Pubkey::new_unique();
        let accounts = Arc::new(Accounts::default());
        accounts.0.lock().insert(
            gateway_token_address(&owner, &network, &GATEWAY_PROGRAM_ID),
            (GATEWAY_PROGRAM_ID, token_bytes(&owner, &network, state, expire_time)),
        );
        (
            GatewayTokenGate::new(accounts, GATEWAY_PROGRAM_ID),
            KeypairWallet::from_keypair(keypair),
            network,
        )
    }

    #[tokio::test]
    async fn test_active_token_grants_passage() {
        let (gate, wallet, network) = setup(GatewayTokenState::Active, None);
        let decision = gate.request_passage(&network, &wallet).await;
        assert!(matches!(decision, GateDecision::Granted { .. }));
    }

    #[tokio::test]
    async fn test_revoked_or_expired_token_is_withheld() {
        let (gate, wallet, network) = setup(GatewayTokenState::Revoked, None);
        assert_eq!(gate.request_passage(&network, &wallet).await, GateDecision::Withheld);

        let (gate, wallet, network) = setup(GatewayTokenState::Active, Some(1));
        assert_eq!(gate.request_passage(&network, &wallet).await, GateDecision::Withheld);
    }

    #[tokio::test]
    async fn test_missing_token_or_wallet_is_withheld() {
        let (gate, _, network) = setup(GatewayTokenState::Active, None);
        let stranger = KeypairWallet::from_keypair(Keypair::new());
        assert_eq!(gate.request_passage(&network, &stranger).await, GateDecision::Withheld);
        assert_eq!(
            gate.request_passage(&network, &KeypairWallet::disconnected()).await,
            GateDecision::Withheld
        );
    }

    #[test]
    fn test_decode_rejects_unknown_state() {
        let mut bytes = token_bytes(&Pubkey::new_unique(), &Pubkey::new_unique(), GatewayTokenState::Frozen, None);
        // state tag sits before the trailing expire_time option byte
        let tag = bytes.len() - 2;
        assert_eq!(bytes[tag], 1);
        bytes[tag] = 9;
        assert!(GatewayToken::decode(&bytes).is_err());
    }
}
