//! The stake account record and its fixed binary layout.
//!
//! Layout (little-endian), at least [`RECORD_LEN`] bytes:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 8 | discriminator (not checked) |
//! | 8 | 32 | owner |
//! | 40 | 8 | staked principal |
//! | 48 | 8 | total points |
//! | 56 | 8 | last updated time |
//! | 64 | 1 | bump |

use crate::domain::locator::{account_discriminator, POSITION_ACCOUNT_NAME};
use crate::engine::accrual;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub const DISCRIMINATOR_LEN: usize = 8;
pub const IDENTITY_LEN: usize = 32;
pub const RECORD_LEN: usize = DISCRIMINATOR_LEN + IDENTITY_LEN + 8 + 8 + 8 + 1;

const OWNER_OFFSET: usize = DISCRIMINATOR_LEN;
const STAKED_OFFSET: usize = OWNER_OFFSET + IDENTITY_LEN;
const POINTS_OFFSET: usize = STAKED_OFFSET + 8;
const UPDATED_OFFSET: usize = POINTS_OFFSET + 8;
const BUMP_OFFSET: usize = UPDATED_OFFSET + 8;

/// A user's position as last reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub owner: Pubkey,
    /// Staked amount in lamports.
    pub staked_principal: u64,
    /// Settled points, in raw (unscaled) units.
    pub total_points: u64,
    /// Unix seconds of the last on-chain settlement.
    pub last_updated_time: u64,
    pub bump: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed record: expected at least {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },
}

impl Position {
    /// A freshly created position: nothing staked, nothing settled.
    pub fn empty(owner: Pubkey, bump: u8, created_at: u64) -> Self {
        Self {
            owner,
            staked_principal: 0,
            total_points: 0,
            last_updated_time: created_at,
            bump,
        }
    }

    /// Decode a record. Bytes past [`RECORD_LEN`] are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < RECORD_LEN {
            return Err(DecodeError::MalformedRecord {
                expected: RECORD_LEN,
                actual: data.len(),
            });
        }

        Ok(Self {
            owner: Pubkey::new_from_array(read_array(data, OWNER_OFFSET)),
            staked_principal: read_u64(data, STAKED_OFFSET),
            total_points: read_u64(data, POINTS_OFFSET),
            last_updated_time: read_u64(data, UPDATED_OFFSET),
            bump: data[BUMP_OFFSET],
        })
    }

    /// Encode in the on-chain layout, discriminator included.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        out.extend_from_slice(&account_discriminator(POSITION_ACCOUNT_NAME));
        out.extend_from_slice(self.owner.as_ref());
        out.extend_from_slice(&self.staked_principal.to_le_bytes());
        out.extend_from_slice(&self.total_points.to_le_bytes());
        out.extend_from_slice(&self.last_updated_time.to_le_bytes());
        out.push(self.bump);
        out
    }

    /// Settled points plus what has accrued since the last settlement.
    pub fn claimable_points(&self, now: i64) -> u64 {
        self.total_points.saturating_add(accrual::accrued(
            self.staked_principal,
            self.last_updated_time,
            now,
        ))
    }
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(read_array(data, offset))
}
