//! Ledger abstraction: the narrow async interface to the staking program.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;

pub mod instructions;
pub mod mock;
pub mod rpc;

pub use mock::MockLedger;
pub use rpc::RpcLedger;

/// The five operations the engine needs from the staking program.
///
/// Every call may fail and has no latency bound.
#[async_trait]
pub trait Ledger: Send + Sync + fmt::Debug {
    /// Fetch the raw position record at `locator`, or `None` if no account exists.
    async fn read_record(&self, locator: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    async fn create_position(&self, payer: &Pubkey, locator: &Pubkey)
        -> Result<Receipt, LedgerError>;

    /// Stake `amount_units` more lamports.
    async fn increase_stake(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        amount_units: u64,
    ) -> Result<Receipt, LedgerError>;

    /// Withdraw `amount_units` staked lamports.
    async fn decrease_stake(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        amount_units: u64,
    ) -> Result<Receipt, LedgerError>;

    /// Settle and reset accrued points.
    async fn claim(&self, owner: &Pubkey, locator: &Pubkey) -> Result<Receipt, LedgerError>;
}

/// Proof that a mutation landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub signature: Signature,
}

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// RPC transport or node error
    Rpc(String),
    /// Transaction was built but failed to land or confirm
    Transaction(String),
    /// The program refused the instruction
    Program(String),
    /// The configured signer cannot act for the requested identity
    Signer(String),
    /// Other error
    Other(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Rpc(msg) => write!(f, "RPC error: {}", msg),
            LedgerError::Transaction(msg) => write!(f, "Transaction failed: {}", msg),
            LedgerError::Program(msg) => write!(f, "Program error: {}", msg),
            LedgerError::Signer(msg) => write!(f, "Signer error: {}", msg),
            LedgerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}
