//! Session-owned position state.
//!
//! [`PositionStore`] is a plain value; [`StoreHandle`] shares it between the
//! scheduler and the orchestrator. Every handle method takes the lock for one
//! synchronous operation and releases it before returning, so no caller can
//! observe a half-applied update and no lock is ever held across an `.await`.

use crate::domain::{Decimal, DisplayState, Position};
use crate::engine::accrual::{self, POINTS_PER_WHOLE, UNITS_PER_WHOLE};
use crate::error::Rejection;
use crate::ledger::LedgerError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PositionStore {
    current_position: Option<Position>,
    last_mutation_error: Option<LedgerError>,
    is_synchronizing: bool,
    is_mutating: bool,
    refresh_pending: bool,
    disposed: bool,
}

/// Result of offering a fresh snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Applied,
    /// Older than the held position; ignored.
    Stale,
    Disposed,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<&Position> {
        self.current_position.as_ref()
    }

    pub fn last_mutation_error(&self) -> Option<&LedgerError> {
        self.last_mutation_error.as_ref()
    }

    pub fn is_synchronizing(&self) -> bool {
        self.is_synchronizing
    }

    pub fn is_mutating(&self) -> bool {
        self.is_mutating
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Display values as of `now`, recomputed from the held position.
    pub fn read(&self, now: i64) -> DisplayState {
        let Some(position) = self.current_position.as_ref() else {
            return DisplayState {
                is_synchronizing: self.is_synchronizing,
                is_mutating: self.is_mutating,
                ..DisplayState::default()
            };
        };

        let raw = position.claimable_points(now);
        let points = accrual::to_display_points(raw);
        DisplayState {
            has_position: true,
            staked_amount: Decimal::from_units(position.staked_principal, UNITS_PER_WHOLE),
            claimable_points: points,
            claimable_points_raw: raw,
            points_value: Decimal::from_units(points, POINTS_PER_WHOLE),
            last_updated_time: Some(position.last_updated_time),
            is_synchronizing: self.is_synchronizing,
            is_mutating: self.is_mutating,
        }
    }

    /// Swap in a new snapshot wholesale.
    ///
    /// A snapshot whose `last_updated_time` is older than the held one for the
    /// same owner is ignored, so the settlement time never moves backward.
    pub fn replace(&mut self, position: Position) -> ReplaceOutcome {
        if self.disposed {
            return ReplaceOutcome::Disposed;
        }
        if let Some(current) = &self.current_position {
            if current.owner == position.owner
                && position.last_updated_time < current.last_updated_time
            {
                debug!(
                    held = current.last_updated_time,
                    offered = position.last_updated_time,
                    "ignoring stale position snapshot"
                );
                return ReplaceOutcome::Stale;
            }
        }
        self.current_position = Some(position);
        ReplaceOutcome::Applied
    }

    /// Drop the held position. Returns false once disposed.
    pub fn clear(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.current_position = None;
        true
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.current_position = None;
        self.refresh_pending = false;
    }
}

/// Shared handle to a session's [`PositionStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    inner: Arc<Mutex<PositionStore>>,
    refresh_idle: Arc<Notify>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PositionStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, now: i64) -> DisplayState {
        self.lock().read(now)
    }

    pub fn position(&self) -> Option<Position> {
        self.lock().current_position
    }

    pub fn last_mutation_error(&self) -> Option<LedgerError> {
        self.lock().last_mutation_error.clone()
    }

    pub fn is_synchronizing(&self) -> bool {
        self.lock().is_synchronizing
    }

    pub fn is_mutating(&self) -> bool {
        self.lock().is_mutating
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    pub fn replace(&self, position: Position) -> ReplaceOutcome {
        self.lock().replace(position)
    }

    pub fn clear(&self) -> bool {
        self.lock().clear()
    }

    /// Tear the store down. Later writes are discarded and no new refresh or
    /// mutation can start.
    pub fn dispose(&self) {
        self.lock().dispose();
    }

    /// Mark a refresh as in flight.
    ///
    /// Returns `None` if one already is (a refresh is then marked pending, see
    /// [`StoreHandle::take_refresh_pending`]) or if the store is disposed.
    pub fn try_begin_refresh(&self) -> Option<RefreshGuard> {
        let mut store = self.lock();
        if store.disposed {
            return None;
        }
        if store.is_synchronizing {
            store.refresh_pending = true;
            return None;
        }
        store.is_synchronizing = true;
        Some(RefreshGuard {
            store: self.clone(),
        })
    }

    /// Wait until no refresh is in flight.
    ///
    /// A refresh marked pending before this call is included: the flag only
    /// clears once the in-flight refresh has run its extra read.
    pub async fn wait_refresh_idle(&self) {
        loop {
            let notified = self.refresh_idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if !self.is_synchronizing() {
                return;
            }
            notified.await;
        }
    }

    /// Consume a refresh request that arrived while one was in flight.
    pub fn take_refresh_pending(&self) -> bool {
        let mut store = self.lock();
        std::mem::take(&mut store.refresh_pending) && !store.disposed
    }

    /// Atomically check that no mutation is in flight, run `check` against the
    /// last synchronized position, and mark a mutation as in flight.
    pub fn try_begin_mutation(
        &self,
        check: impl FnOnce(Option<&Position>) -> Result<(), Rejection>,
    ) -> Result<MutationGuard, Rejection> {
        let mut store = self.lock();
        if store.disposed {
            return Err(Rejection::SessionClosed);
        }
        if store.is_mutating {
            return Err(Rejection::MutationInFlight);
        }
        check(store.current_position.as_ref())?;
        store.is_mutating = true;
        Ok(MutationGuard {
            store: self.clone(),
        })
    }
}

/// Clears `is_synchronizing` when dropped.
#[derive(Debug)]
pub struct RefreshGuard {
    store: StoreHandle,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.store.lock().is_synchronizing = false;
        self.store.refresh_idle.notify_waiters();
    }
}

/// Clears `is_mutating` when dropped, whichever way the mutation ends.
#[derive(Debug)]
pub struct MutationGuard {
    store: StoreHandle,
}

impl MutationGuard {
    /// Record how the mutation ended and release the flag.
    pub fn complete(self, error: Option<&LedgerError>) {
        {
            let mut store = self.store.lock();
            if !store.disposed {
                store.last_mutation_error = error.cloned();
            }
        }
        drop(self);
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.store.lock().is_mutating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn position(staked: u64, points: u64, updated: u64) -> Position {
        Position {
            owner: Pubkey::new_from_array([1u8; 32]),
            staked_principal: staked,
            total_points: points,
            last_updated_time: updated,
            bump: 255,
        }
    }

    #[test]
    fn test_read_without_position_is_zeroed() {
        let store = PositionStore::new();
        let display = store.read(1_000);
        assert!(!display.has_position);
        assert_eq!(display.claimable_points, 0);
        assert_eq!(display.staked_amount, Decimal::zero());
    }

    #[test]
    fn test_read_recomputes_against_now() {
        let mut store = PositionStore::new();
        store.replace(position(2 * UNITS_PER_WHOLE, 5_000_000, 1_000));

        assert_eq!(store.read(1_000).claimable_points, 5);
        assert_eq!(store.read(1_100).claimable_points, 205);
        assert_eq!(store.read(1_100).claimable_points_raw, 205_000_000);
        assert_eq!(store.read(1_100).staked_amount.to_string(), "2");
    }

    #[test]
    fn test_replace_ignores_older_snapshot() {
        let mut store = PositionStore::new();
        assert_eq!(store.replace(position(1, 0, 2_000)), ReplaceOutcome::Applied);
        assert_eq!(store.replace(position(9, 0, 1_999)), ReplaceOutcome::Stale);
        assert_eq!(store.position().unwrap().staked_principal, 1);
        assert_eq!(store.replace(position(9, 0, 2_000)), ReplaceOutcome::Applied);
        assert_eq!(store.position().unwrap().staked_principal, 9);
    }

    #[test]
    fn test_dispose_blocks_writes() {
        let handle = StoreHandle::new();
        handle.replace(position(1, 0, 1));
        handle.dispose();
        assert!(handle.position().is_none());
        assert_eq!(handle.replace(position(1, 0, 2)), ReplaceOutcome::Disposed);
        assert!(!handle.clear());
        assert!(handle.try_begin_refresh().is_none());
        assert_eq!(
            handle.try_begin_mutation(|_| Ok(())).unwrap_err(),
            Rejection::SessionClosed
        );
    }

    #[test]
    fn test_refresh_guard_clears_flag_on_drop() {
        let handle = StoreHandle::new();
        let guard = handle.try_begin_refresh().unwrap();
        assert!(handle.is_synchronizing());
        assert!(handle.try_begin_refresh().is_none());
        assert!(handle.take_refresh_pending());
        assert!(!handle.take_refresh_pending());
        drop(guard);
        assert!(!handle.is_synchronizing());
        assert!(handle.try_begin_refresh().is_some());
    }

    #[tokio::test]
    async fn test_wait_refresh_idle_returns_when_guard_drops() {
        let handle = StoreHandle::new();
        handle.wait_refresh_idle().await;

        let guard = handle.try_begin_refresh().unwrap();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_refresh_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(!handle.is_synchronizing());
    }

    #[test]
    fn test_mutation_guard_rejects_overlap_and_releases() {
        let handle = StoreHandle::new();
        let guard = handle.try_begin_mutation(|_| Ok(())).unwrap();
        assert!(handle.is_mutating());
        assert_eq!(
            handle.try_begin_mutation(|_| Ok(())).unwrap_err(),
            Rejection::MutationInFlight
        );
        guard.complete(Some(&LedgerError::Rpc("timeout".to_string())));
        assert!(!handle.is_mutating());
        assert_eq!(
            handle.last_mutation_error(),
            Some(LedgerError::Rpc("timeout".to_string()))
        );
    }

    #[test]
    fn test_failed_check_leaves_flag_clear() {
        let handle = StoreHandle::new();
        let err = handle
            .try_begin_mutation(|p| p.map(|_| ()).ok_or(Rejection::NoPosition))
            .unwrap_err();
        assert_eq!(err, Rejection::NoPosition);
        assert!(!handle.is_mutating());
    }
}
