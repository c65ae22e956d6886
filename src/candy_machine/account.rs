//! Candy machine v2 account decoding
//!
//! Accounts are Anchor accounts: an 8-byte discriminator followed by the
//! Borsh encoding of the struct.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

use super::anchor_discriminator;
use crate::errors::StateFetchError;

/// Length of the Anchor account discriminator
pub const DISCRIMINATOR_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    pub share: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct HiddenSettings {
    pub name: String,
    pub uri: String,
    pub hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct WhitelistMintSettings {
    /// 0 = burn every time, 1 = never burn
    pub mode: u8,
    pub mint: Pubkey,
    pub presale: bool,
    pub discount_price: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct RawEndSettings {
    /// 0 = date, 1 = amount
    pub end_setting_type: u8,
    pub number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct RawGatekeeper {
    pub gatekeeper_network: Pubkey,
    pub expire_on_use: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct CandyMachineData {
    pub uuid: String,
    pub price: u64,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub max_supply: u64,
    pub is_mutable: bool,
    pub retain_authority: bool,
    pub go_live_date: Option<i64>,
    pub end_settings: Option<RawEndSettings>,
    pub creators: Vec<Creator>,
    pub hidden_settings: Option<HiddenSettings>,
    pub whitelist_mint_settings: Option<WhitelistMintSettings>,
    pub items_available: u64,
    pub gatekeeper: Option<RawGatekeeper>,
}

/// Decoded candy machine v2 account
#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct CandyMachineAccount {
    pub authority: Pubkey,
    pub wallet: Pubkey,
    pub token_mint: Option<Pubkey>,
    pub items_redeemed: u64,
    pub data: CandyMachineData,
}

impl CandyMachineAccount {
    /// Decode from raw account data (discriminator included).
    ///
    /// Trailing bytes (config lines) are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, StateFetchError> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(StateFetchError::Decode(format!(
                "account data truncated: {} bytes",
                data.len()
            )));
        }
        let (discriminator, mut body) = data.split_at(DISCRIMINATOR_LEN);
        if discriminator != anchor_discriminator("account", "CandyMachine") {
            return Err(StateFetchError::Decode(
                "discriminator mismatch: not a CandyMachine account".to_string(),
            ));
        }

        Self::deserialize(&mut body)
            .map_err(|e| StateFetchError::Decode(format!("invalid candy machine account: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::{encode, Fixture};
    use super::*;

    #[test]
    fn test_decode_fixture() {
        let network = Pubkey::new_unique();
        let fixture = Fixture {
            gatekeeper: Some((network, true)),
            end_settings: Some((1, 20)),
            ..Fixture::default()
        };
        let account = CandyMachineAccount::decode(&encode(&fixture)).unwrap();

        assert_eq!(account.wallet, fixture.wallet);
        assert_eq!(account.items_redeemed, 3);
        assert_eq!(account.data.items_available, 24);
        assert_eq!(account.data.symbol, "TRSR");
        assert_eq!(account.data.go_live_date, Some(1_640_000_000));
        assert_eq!(account.data.creators.len(), 1);
        assert_eq!(
            account.data.end_settings,
            Some(RawEndSettings { end_setting_type: 1, number: 20 })
        );
        assert_eq!(
            account.data.gatekeeper,
            Some(RawGatekeeper { gatekeeper_network: network, expire_on_use: true })
        );
    }

    #[test]
    fn test_decode_ignores_config_lines() {
        let mut data = encode(&Fixture::default());
        data.extend_from_slice(&[0xab; 64]);
        assert!(CandyMachineAccount::decode(&data).is_ok());
    }

    #[test]
    fn test_decode_rejects_wrong_discriminator() {
        let mut data = encode(&Fixture::default());
        data[0] ^= 0xff;
        let err = CandyMachineAccount::decode(&data).unwrap_err();
        assert!(err.to_string().contains("discriminator"));
    }

    #[test]
    fn test_decode_rejects_truncated_data() {
        let data = encode(&Fixture::default());
        assert!(matches!(
            CandyMachineAccount::decode(&data[..60]),
            Err(StateFetchError::Decode(_))
        ));
        assert!(matches!(
            CandyMachineAccount::decode(&data[..4]),
            Err(StateFetchError::Decode(_))
        ));
    }
}
