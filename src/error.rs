use crate::ledger::LedgerError;
use thiserror::Error;

/// Why a mutation was refused before any ledger call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("amount must be greater than 0")]
    InvalidAmount,
    #[error("insufficient staked amount: requested {requested} lamports, staked {staked}")]
    InsufficientStake { requested: u64, staked: u64 },
    #[error("no staking account; create one first")]
    NoPosition,
    #[error("staking account already exists")]
    PositionExists,
    #[error("another transaction is still in flight")]
    MutationInFlight,
    #[error("session has been closed")]
    SessionClosed,
}

#[derive(Debug, Clone, Error)]
pub enum MutationError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl MutationError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            MutationError::Rejected(r) => Some(r),
            MutationError::Ledger(_) => None,
        }
    }
}
