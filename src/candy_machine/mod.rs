//! Candy machine v2 on-chain plumbing
//!
//! - **account**: Borsh decoding of the candy machine account
//! - **instructions**: mint transaction planning (`mint_nft` plus its setup
//!   and cleanup instructions)
//!
//! Program ids and PDA derivations shared by both live here.

pub mod account;
pub mod instructions;

pub use account::CandyMachineAccount;
pub use instructions::{build_mint_plan, MintPlan, MintRequest};

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Candy machine v2 program
pub const CANDY_MACHINE_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("cndy3Z4yapfJBmL3ShUp5exZKqR3z33thTzeNMm2gRZ");

/// Metaplex token metadata program
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Civic gateway program issuing identity passes
pub const GATEWAY_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("gatem74V238djXdzWnJf94Wo1DcnuGkfijbf3AuBhfs");

/// Anchor 8-byte discriminator: `sha256("<namespace>:<name>")[..8]`
pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// PDA that signs as the collection creator for a candy machine
pub fn candy_machine_creator(candy_machine: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"candy_machine", candy_machine.as_ref()], program_id)
}

pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

pub fn master_edition_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Gateway token a wallet holds for a gatekeeper network (seed index 0)
pub fn gateway_token_address(wallet: &Pubkey, network: &Pubkey, gateway_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[wallet.as_ref(), b"gateway", &[0u8; 8], network.as_ref()],
        gateway_program,
    )
    .0
}

/// Expire-on-use feature account of a gatekeeper network
pub fn network_expire_address(network: &Pubkey, gateway_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[network.as_ref(), b"expire"], gateway_program).0
}
