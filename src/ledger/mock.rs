//! In-memory ledger for testing without a cluster.
//!
//! Settles accrual the way the program does on every mutation, and can be told
//! to fail or to hold calls in flight until released.

use super::{Ledger, LedgerError, Receipt};
use crate::domain::locator;
use crate::domain::Position;
use crate::engine::accrual;
use crate::engine::Clock;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct MockLedger {
    program_id: Pubkey,
    clock: Arc<dyn Clock>,
    state: Mutex<MockState>,
    read_gate: Option<Arc<Semaphore>>,
    mutation_gate: Option<Arc<Semaphore>>,
}

#[derive(Debug, Default)]
struct MockState {
    records: HashMap<Pubkey, Vec<u8>>,
    read_calls: usize,
    mutation_calls: usize,
    failing_reads: usize,
    failing_mutations: Option<String>,
    next_signature: u64,
}

impl MockLedger {
    pub fn new(program_id: Pubkey, clock: Arc<dyn Clock>) -> Self {
        Self {
            program_id,
            clock,
            state: Mutex::new(MockState::default()),
            read_gate: None,
            mutation_gate: None,
        }
    }

    /// Seed a decoded position at `locator`.
    pub fn with_position(self, locator: Pubkey, position: Position) -> Self {
        self.set_position(locator, position);
        self
    }

    /// Seed arbitrary bytes at `locator`.
    pub fn with_raw_record(self, locator: Pubkey, data: Vec<u8>) -> Self {
        self.lock().records.insert(locator, data);
        self
    }

    /// Every read waits for a permit from `gate` before answering.
    pub fn with_read_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.read_gate = Some(gate);
        self
    }

    /// Every mutation waits for a permit from `gate` before applying.
    pub fn with_mutation_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.mutation_gate = Some(gate);
        self
    }

    pub fn set_position(&self, locator: Pubkey, position: Position) {
        self.lock().records.insert(locator, position.encode());
    }

    pub fn remove_record(&self, locator: &Pubkey) {
        self.lock().records.remove(locator);
    }

    /// The position currently held at `locator`, if it decodes.
    pub fn position(&self, locator: &Pubkey) -> Option<Position> {
        self.lock()
            .records
            .get(locator)
            .and_then(|data| Position::decode(data).ok())
    }

    /// Make the next `n` reads fail.
    pub fn fail_next_reads(&self, n: usize) {
        self.lock().failing_reads = n;
    }

    /// Make every mutation fail with `message` until cleared with `None`.
    pub fn fail_mutations(&self, message: Option<&str>) {
        self.lock().failing_mutations = message.map(str::to_string);
    }

    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }

    pub fn mutation_calls(&self) -> usize {
        self.lock().mutation_calls
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> u64 {
        self.clock.now().max(0) as u64
    }

    async fn pass(gate: &Option<Arc<Semaphore>>) -> Result<(), LedgerError> {
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| LedgerError::Other(e.to_string()))?
                .forget();
        }
        Ok(())
    }

    /// Count the call, wait at the gate, then apply `f` to the settled position.
    async fn mutate(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        f: impl FnOnce(&mut Position) -> Result<(), LedgerError>,
    ) -> Result<Receipt, LedgerError> {
        self.lock().mutation_calls += 1;
        Self::pass(&self.mutation_gate).await?;

        let now = self.now();
        let mut state = self.lock();
        if let Some(message) = &state.failing_mutations {
            return Err(LedgerError::Transaction(message.clone()));
        }
        let mut position = state
            .records
            .get(locator)
            .ok_or_else(|| LedgerError::Program("AccountNotInitialized".to_string()))
            .and_then(|data| {
                Position::decode(data).map_err(|e| LedgerError::Program(e.to_string()))
            })?;
        if position.owner != *owner {
            return Err(LedgerError::Program("Unauthorized access".to_string()));
        }

        settle(&mut position, now);
        f(&mut position)?;
        state.records.insert(*locator, position.encode());
        Ok(next_receipt(&mut state))
    }
}

/// Fold accrual since the last update into `total_points`.
fn settle(position: &mut Position, now: u64) {
    let earned = accrual::accrued(
        position.staked_principal,
        position.last_updated_time,
        now as i64,
    );
    position.total_points = position.total_points.saturating_add(earned);
    position.last_updated_time = position.last_updated_time.max(now);
}

fn next_receipt(state: &mut MockState) -> Receipt {
    state.next_signature += 1;
    let mut bytes = [0u8; 64];
    bytes[..8].copy_from_slice(&state.next_signature.to_le_bytes());
    Receipt {
        signature: Signature::from(bytes),
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn read_record(&self, locator: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        self.lock().read_calls += 1;
        Self::pass(&self.read_gate).await?;

        let mut state = self.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(LedgerError::Rpc("mock read failure".to_string()));
        }
        Ok(state.records.get(locator).cloned())
    }

    async fn create_position(
        &self,
        payer: &Pubkey,
        locator: &Pubkey,
    ) -> Result<Receipt, LedgerError> {
        self.lock().mutation_calls += 1;
        Self::pass(&self.mutation_gate).await?;

        let derived = locator::derive(payer, &self.program_id);
        if derived.address != *locator {
            return Err(LedgerError::Program("ConstraintSeeds".to_string()));
        }

        let now = self.now();
        let mut state = self.lock();
        if let Some(message) = &state.failing_mutations {
            return Err(LedgerError::Transaction(message.clone()));
        }
        if state.records.contains_key(locator) {
            return Err(LedgerError::Program("account already in use".to_string()));
        }
        let position = Position::empty(*payer, derived.bump, now);
        state.records.insert(*locator, position.encode());
        Ok(next_receipt(&mut state))
    }

    async fn increase_stake(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        amount_units: u64,
    ) -> Result<Receipt, LedgerError> {
        self.mutate(owner, locator, |position| {
            if amount_units == 0 {
                return Err(LedgerError::Program("Amount must be greater than 0".to_string()));
            }
            position.staked_principal = position
                .staked_principal
                .checked_add(amount_units)
                .ok_or_else(|| LedgerError::Program("Arithmetic overflow".to_string()))?;
            Ok(())
        })
        .await
    }

    async fn decrease_stake(
        &self,
        owner: &Pubkey,
        locator: &Pubkey,
        amount_units: u64,
    ) -> Result<Receipt, LedgerError> {
        self.mutate(owner, locator, |position| {
            if amount_units == 0 {
                return Err(LedgerError::Program("Amount must be greater than 0".to_string()));
            }
            position.staked_principal = position
                .staked_principal
                .checked_sub(amount_units)
                .ok_or_else(|| LedgerError::Program("Insufficient staked amount".to_string()))?;
            Ok(())
        })
        .await
    }

    async fn claim(&self, owner: &Pubkey, locator: &Pubkey) -> Result<Receipt, LedgerError> {
        self.mutate(owner, locator, |position| {
            position.total_points = 0;
            Ok(())
        })
        .await
    }
}
