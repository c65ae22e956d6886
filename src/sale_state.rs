//! Account state reader
//!
//! Fetches the candy machine account for a sale and turns it into a
//! [`SaleState`] snapshot. Reads are idempotent and uncoordinated: concurrent
//! refreshes are allowed, and each result replaces the previous snapshot
//! rather than merging into it.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

use crate::candy_machine::CandyMachineAccount;
use crate::errors::StateFetchError;
use crate::ledger::AccountSource;
use crate::types::{EndSettings, GatekeeperSettings, SaleState};
use crate::wallet::WalletProvider;

/// Source of sale-state snapshots
#[async_trait]
pub trait SaleStateSource: Send + Sync {
    async fn fetch(&self, sale_id: &Pubkey, wallet: &dyn WalletProvider) -> Result<SaleState, StateFetchError>;
}

/// Reads candy machine v2 accounts over RPC
pub struct CandyMachineReader {
    accounts: Arc<dyn AccountSource>,
    program_id: Pubkey,
}

impl CandyMachineReader {
    pub fn new(accounts: Arc<dyn AccountSource>, program_id: Pubkey) -> Self {
        Self {
            accounts,
            program_id,
        }
    }
}

#[async_trait]
impl SaleStateSource for CandyMachineReader {
    async fn fetch(&self, sale_id: &Pubkey, _wallet: &dyn WalletProvider) -> Result<SaleState, StateFetchError> {
        let (owner, data) = self
            .accounts
            .account(sale_id)
            .await?
            .ok_or(StateFetchError::AccountNotFound(*sale_id))?;

        if owner != self.program_id {
            return Err(StateFetchError::Decode(format!(
                "account {} is owned by {}, not the candy machine program {}",
                sale_id, owner, self.program_id
            )));
        }

        let account = CandyMachineAccount::decode(&data)?;
        let state = sale_state_from_account(*sale_id, &account, Utc::now());
        debug!(
            sale = %sale_id,
            is_active = state.is_active,
            items_remaining = state.items_remaining,
            "Sale state fetched"
        );
        Ok(state)
    }
}

/// Derive the sale snapshot as of `now`
pub fn sale_state_from_account(id: Pubkey, account: &CandyMachineAccount, now: DateTime<Utc>) -> SaleState {
    let data = &account.data;
    let items_available = data.items_available;
    let items_redeemed = account.items_redeemed;
    let items_remaining = items_available.saturating_sub(items_redeemed);

    let go_live_date = data
        .go_live_date
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

    let end_settings = data.end_settings.map(|end| match end.end_setting_type {
        // a date past i64::MAX never arrives
        0 => EndSettings::Date(i64::try_from(end.number).unwrap_or(i64::MAX)),
        _ => EndSettings::Amount(end.number),
    });

    let end_reached = match end_settings {
        Some(EndSettings::Date(ts)) => now.timestamp() >= ts,
        Some(EndSettings::Amount(amount)) => items_redeemed >= amount,
        None => false,
    };

    let is_live = go_live_date.is_some_and(|date| date <= now);

    SaleState {
        id,
        is_active: is_live && !end_reached,
        is_sold_out: items_remaining == 0,
        go_live_date,
        gatekeeper: data.gatekeeper.map(|g| GatekeeperSettings {
            network: g.gatekeeper_network,
            expire_on_use: g.expire_on_use,
        }),
        treasury: account.wallet,
        token_mint: account.token_mint,
        // whitelist discounts are not applied; the full price is what gets charged
        price: data.price,
        items_available,
        items_redeemed,
        items_remaining,
        end_settings,
        has_whitelist: data.whitelist_mint_settings.is_some(),
    }
}
