//! Mint transaction planning
//!
//! A candy machine v2 mint is one transaction with this instruction order:
//! 1. `create_account` for a fresh mint (rent-exempt, owned by the token program)
//! 2. `initialize_mint` (decimals 0, payer as mint and freeze authority)
//! 3. create the payer's associated token account for the mint
//! 4. `mint_to` one token
//! 5. `approve` the transfer authority (SPL-token priced sales only)
//! 6. `mint_nft` on the candy machine
//!
//! SPL-token priced sales also get a cleanup transaction revoking the
//! approval.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction, system_program, sysvar,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use spl_token::solana_program::program_pack::Pack;

use super::{
    anchor_discriminator, candy_machine_creator, gateway_token_address, master_edition_address,
    metadata_address, network_expire_address, TOKEN_METADATA_PROGRAM_ID,
};
use crate::errors::MintError;
use crate::types::SaleState;

/// Size of an SPL mint account
pub fn mint_account_len() -> usize {
    spl_token::state::Mint::LEN
}

/// Inputs for one mint transaction
#[derive(Debug, Clone)]
pub struct MintRequest<'a> {
    pub sale: &'a SaleState,
    pub payer: Pubkey,
    pub candy_machine_program: Pubkey,
    pub gateway_program: Pubkey,
    /// Gateway token granted for a gated sale; derived from the payer when absent
    pub gateway_token: Option<Pubkey>,
    /// Rent-exempt balance for the new mint account
    pub mint_rent_lamports: u64,
}

/// Planned mint: instructions plus the ephemeral keypairs that must co-sign
pub struct MintPlan {
    pub mint: Pubkey,
    pub instructions: Vec<Instruction>,
    /// Instructions for the follow-up transaction (may be empty)
    pub cleanup: Vec<Instruction>,
    /// Ephemeral signers besides the payer (mint account, transfer authority)
    pub signers: Vec<Keypair>,
}

impl std::fmt::Debug for MintPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintPlan")
            .field("mint", &self.mint)
            .field("instructions", &self.instructions.len())
            .field("cleanup", &self.cleanup.len())
            .field("signers", &self.signers.len())
            .finish()
    }
}

fn token_ix_error(what: &str, err: impl std::fmt::Display) -> MintError {
    MintError::Configuration(format!("failed to build {} instruction: {}", what, err))
}

/// Plan the instructions for minting one token from `request.sale`
pub fn build_mint_plan(request: &MintRequest<'_>) -> Result<MintPlan, MintError> {
    let sale = request.sale;
    let payer = request.payer;
    let token_program = spl_token::id();

    let mint = Keypair::new();
    let mint_pubkey = mint.pubkey();
    let user_token_account = get_associated_token_address(&payer, &mint_pubkey);

    let mut instructions = vec![
        system_instruction::create_account(
            &payer,
            &mint_pubkey,
            request.mint_rent_lamports,
            mint_account_len() as u64,
            &token_program,
        ),
        spl_token::instruction::initialize_mint(&token_program, &mint_pubkey, &payer, Some(&payer), 0)
            .map_err(|e| token_ix_error("initialize_mint", e))?,
        create_associated_token_account(&payer, &payer, &mint_pubkey, &token_program),
        spl_token::instruction::mint_to(&token_program, &mint_pubkey, &user_token_account, &payer, &[], 1)
            .map_err(|e| token_ix_error("mint_to", e))?,
    ];
    let mut cleanup = Vec::new();
    let mut signers = vec![mint];
    let mut remaining_accounts = Vec::new();

    if let Some(gatekeeper) = &sale.gatekeeper {
        let gateway_token = request.gateway_token.unwrap_or_else(|| {
            gateway_token_address(&payer, &gatekeeper.network, &request.gateway_program)
        });
        remaining_accounts.push(AccountMeta::new(gateway_token, false));
        if gatekeeper.expire_on_use {
            remaining_accounts.push(AccountMeta::new_readonly(request.gateway_program, false));
            remaining_accounts.push(AccountMeta::new_readonly(
                network_expire_address(&gatekeeper.network, &request.gateway_program),
                false,
            ));
        }
    }

    if let Some(token_mint) = &sale.token_mint {
        let transfer_authority = Keypair::new();
        let paying_account = get_associated_token_address(&payer, token_mint);

        remaining_accounts.push(AccountMeta::new(paying_account, false));
        remaining_accounts.push(AccountMeta::new_readonly(transfer_authority.pubkey(), true));

        instructions.push(
            spl_token::instruction::approve(
                &token_program,
                &paying_account,
                &transfer_authority.pubkey(),
                &payer,
                &[],
                sale.price,
            )
            .map_err(|e| token_ix_error("approve", e))?,
        );
        cleanup.push(
            spl_token::instruction::revoke(&token_program, &paying_account, &payer, &[])
                .map_err(|e| token_ix_error("revoke", e))?,
        );
        signers.push(transfer_authority);
    }

    let (creator, creator_bump) = candy_machine_creator(&sale.id, &request.candy_machine_program);

    let mut data = anchor_discriminator("global", "mint_nft").to_vec();
    data.push(creator_bump);

    let mut accounts = vec![
        AccountMeta::new(sale.id, false),
        AccountMeta::new_readonly(creator, false),
        AccountMeta::new(payer, true),
        AccountMeta::new(sale.treasury, false),
        AccountMeta::new(metadata_address(&mint_pubkey), false),
        AccountMeta::new(mint_pubkey, false),
        AccountMeta::new_readonly(payer, true),
        AccountMeta::new_readonly(payer, true),
        AccountMeta::new(master_edition_address(&mint_pubkey), false),
        AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
        AccountMeta::new_readonly(token_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::slot_hashes::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
    ];
    accounts.extend(remaining_accounts);

    instructions.push(Instruction {
        program_id: request.candy_machine_program,
        accounts,
        data,
    });

    Ok(MintPlan {
        mint: mint_pubkey,
        instructions,
        cleanup,
        signers,
    })
}
