//! Deterministic program addressing: the position locator and Anchor discriminators.

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Constant seed prefixed to the owner identity when deriving the locator.
pub const POSITION_SEED: &[u8] = b"user1";

/// Program id of the deployed staking program.
pub const DEFAULT_PROGRAM_ID: &str = "6wjCHbb4fJivBCesGtUmPEdHRVKaQFa5v1KDZCXC9TGo";

/// Name of the on-chain account type holding a position.
pub const POSITION_ACCOUNT_NAME: &str = "StakeAccount";

/// Address of an owner's position record plus the bump that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    pub address: Pubkey,
    pub bump: u8,
}

/// Derive the position locator for `owner` under `program_id`.
///
/// Pure: same inputs always give the same address and bump.
pub fn derive(owner: &Pubkey, program_id: &Pubkey) -> Locator {
    let (address, bump) = Pubkey::find_program_address(&[POSITION_SEED, owner.as_ref()], program_id);
    Locator { address, bump }
}

/// 8-byte selector Anchor prepends to instruction data.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

/// 8-byte tag Anchor writes at the start of account data.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}

fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}
