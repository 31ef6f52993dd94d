//! Instruction builders for the staking program.

use crate::domain::locator::instruction_discriminator;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

pub fn create_position_ix(program_id: &Pubkey, payer: &Pubkey, locator: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*locator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: instruction_discriminator("create_pda_account").to_vec(),
    }
}

pub fn stake_ix(program_id: &Pubkey, user: &Pubkey, locator: &Pubkey, amount: u64) -> Instruction {
    amount_ix("stake", program_id, user, locator, amount)
}

pub fn unstake_ix(program_id: &Pubkey, user: &Pubkey, locator: &Pubkey, amount: u64) -> Instruction {
    amount_ix("unstake", program_id, user, locator, amount)
}

pub fn claim_points_ix(program_id: &Pubkey, user: &Pubkey, locator: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(*locator, false),
        ],
        data: instruction_discriminator("claim_points").to_vec(),
    }
}

fn amount_ix(
    name: &str,
    program_id: &Pubkey,
    user: &Pubkey,
    locator: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut data = instruction_discriminator(name).to_vec();
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(*locator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}
