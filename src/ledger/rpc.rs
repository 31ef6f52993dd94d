//! Solana JSON-RPC ledger implementation.

use super::instructions::{claim_points_ix, create_position_ix, stake_ix, unstake_ix};
use super::{Ledger, LedgerError, Receipt};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{Instruction, InstructionError};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Custom error codes raised by the staking program.
const PROGRAM_ERRORS: [(u32, &str); 6] = [
    (6000, "Amount must be greater than 0"),
    (6001, "Insufficient staked amount"),
    (6002, "Unauthorized access"),
    (6003, "Arithmetic overflow"),
    (6004, "Arithmetic underflow"),
    (6005, "Invalid timestamp"),
];

/// Message for one of the staking program's custom error codes.
pub fn program_error_message(code: u32) -> Option<&'static str> {
    PROGRAM_ERRORS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, msg)| *msg)
}

/// Classify a failed send: an instruction that the program refused becomes
/// [`LedgerError::Program`], everything else [`LedgerError::Transaction`].
fn send_error(error: &ClientError) -> LedgerError {
    match error.get_transaction_error() {
        Some(TransactionError::InstructionError(_, InstructionError::Custom(code))) => {
            LedgerError::Program(match program_error_message(code) {
                Some(msg) => msg.to_string(),
                None => format!("custom program error: {:#x}", code),
            })
        }
        _ => LedgerError::Transaction(error.to_string()),
    }
}

/// Ledger backed by a Solana RPC node, signing with a local keypair.
pub struct RpcLedger {
    client: Arc<RpcClient>,
    program_id: Pubkey,
    signer: Arc<Keypair>,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    pub fn new(
        rpc_url: String,
        program_id: Pubkey,
        signer: Keypair,
        commitment: CommitmentConfig,
    ) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, commitment)),
            program_id,
            signer: Arc::new(signer),
            commitment,
        }
    }

    /// Identity the transactions are signed with.
    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    /// Only the local keypair can sign, so it must be the identity acting.
    fn ensure_signer(&self, identity: &Pubkey) -> Result<(), LedgerError> {
        let signer = self.signer.pubkey();
        if signer != *identity {
            return Err(LedgerError::Signer(format!(
                "keypair {} cannot sign for {}",
                signer, identity
            )));
        }
        Ok(())
    }

    async fn send(&self, instruction: Instruction) -> Result<Receipt, LedgerError> {
        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let payer = self.signer.pubkey();
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&payer),
            &[&*self.signer],
            blockhash,
        );

        let signature = self
            .client
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| send_error(&e))?;

        info!(%signature, "transaction confirmed");
        Ok(Receipt { signature })
    }
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .field("program_id", &self.program_id)
            .field("signer", &self.signer.pubkey())
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn read_record(&self, locator: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        debug!(%locator, "fetching position record");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let account = retry(backoff, || async {
            self.client
                .get_account_with_commitment(locator, self.commitment)
                .await
                .map(|response| response.value)
                .map_err(|e| backoff::Error::transient(LedgerError::Rpc(e.to_string())))
        })
        .await?;

        Ok(account
            .map(|account| account.data)
            .filter(|data| !data.is_empty()))
    }

    async fn create_position(
        &self,
        payer: &Pubkey,
        locator: &Pubkey,
    ) -> Result<Receipt, LedgerError> {
        self.ensure_signer(payer)?;
        self.send(create_position_ix(&self.program_id, payer, locator))
            .await
    }

    async fn increase_stake(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        amount_units: u64,
    ) -> Result<Receipt, LedgerError> {
        self.ensure_signer(owner)?;
        self.send(stake_ix(&self.program_id, owner, locator, amount_units))
            .await
    }

    async fn decrease_stake(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        amount_units: u64,
    ) -> Result<Receipt, LedgerError> {
        self.ensure_signer(owner)?;
        self.send(unstake_ix(&self.program_id, owner, locator, amount_units))
            .await
    }

    async fn claim(&self, owner: &Pubkey, locator: &Pubkey) -> Result<Receipt, LedgerError> {
        self.ensure_signer(owner)?;
        self.send(claim_points_ix(&self.program_id, owner, locator))
            .await
    }
}
