//! Reconciliation between local extrapolation and authoritative refreshes.
//!
//! One task multiplexes two timers. The fast tick only recomputes the display
//! from the held position. The slow refresh reads the ledger and swaps the
//! position wholesale. Refreshes run as child tasks so ticks keep flowing while
//! a read is outstanding; at most one refresh is in flight at a time.

use crate::config::Config;
use crate::domain::{DecodeError, DisplayState, Position};
use crate::engine::{Clock, ReplaceOutcome, StoreHandle};
use crate::ledger::{Ledger, LedgerError};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub fast_tick: Duration,
    pub refresh_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fast_tick: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(20),
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            fast_tick: Duration::from_millis(config.fast_tick_ms),
            refresh_interval: Duration::from_millis(config.refresh_interval_ms),
        }
    }
}

/// What a single refresh did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A newer snapshot replaced the held position.
    Updated,
    /// The ledger answered with an older snapshot; nothing changed.
    Stale,
    /// No record exists; the store is now empty.
    Absent,
    /// The record could not be decoded; the store is now empty.
    Malformed(DecodeError),
    /// The record belongs to another owner; the store is now empty.
    ForeignOwner(Pubkey),
    /// The read failed; the held position was kept.
    Failed(LedgerError),
    /// Another refresh was already in flight.
    Skipped,
    /// Another refresh was in flight; waited for it, and for its extra read, to finish.
    Joined,
    /// The store was torn down before the result arrived.
    Discarded,
}

/// The authoritative refresh path, shared by the scheduler and the orchestrator.
#[derive(Debug, Clone)]
pub struct Refresher {
    ledger: Arc<dyn Ledger>,
    store: StoreHandle,
    owner: Pubkey,
    locator: Pubkey,
}

impl Refresher {
    pub fn new(ledger: Arc<dyn Ledger>, store: StoreHandle, owner: Pubkey, locator: Pubkey) -> Self {
        Self {
            ledger,
            store,
            owner,
            locator,
        }
    }

    /// Read the record and swap it into the store.
    ///
    /// A no-op returning [`RefreshOutcome::Skipped`] while another refresh is in
    /// flight; that refresh then reads once more before finishing, so a request
    /// made after a mutation is never answered by a read issued before it.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = self.store.try_begin_refresh() else {
            if self.store.is_disposed() {
                return RefreshOutcome::Discarded;
            }
            debug!(locator = %self.locator, "refresh already in flight");
            return RefreshOutcome::Skipped;
        };

        loop {
            let outcome = self.refresh_once().await;
            if !self.store.take_refresh_pending() {
                return outcome;
            }
            debug!(locator = %self.locator, "refresh requested while in flight, reading again");
        }
    }

    /// Like [`Refresher::refresh`], but when another refresh is in flight wait
    /// for it to finish instead of returning at once. On return the store
    /// reflects a read issued after this call started.
    pub async fn refresh_settled(&self) -> RefreshOutcome {
        match self.refresh().await {
            RefreshOutcome::Skipped => {
                self.store.wait_refresh_idle().await;
                RefreshOutcome::Joined
            }
            outcome => outcome,
        }
    }

    async fn refresh_once(&self) -> RefreshOutcome {
        let record = match self.ledger.read_record(&self.locator).await {
            Ok(record) => record,
            Err(e) => {
                warn!(locator = %self.locator, error = %e, "refresh failed, keeping last known position");
                return RefreshOutcome::Failed(e);
            }
        };

        let Some(data) = record else {
            debug!(locator = %self.locator, "no position record");
            return self.clear_with(RefreshOutcome::Absent);
        };

        match Position::decode(&data) {
            Ok(position) if position.owner != self.owner => {
                warn!(locator = %self.locator, owner = %position.owner, "record belongs to another owner");
                self.clear_with(RefreshOutcome::ForeignOwner(position.owner))
            }
            Ok(position) => match self.store.replace(position) {
                ReplaceOutcome::Applied => RefreshOutcome::Updated,
                ReplaceOutcome::Stale => RefreshOutcome::Stale,
                ReplaceOutcome::Disposed => RefreshOutcome::Discarded,
            },
            Err(e) => {
                warn!(locator = %self.locator, error = %e, "discarding undecodable record");
                self.clear_with(RefreshOutcome::Malformed(e))
            }
        }
    }

    fn clear_with(&self, outcome: RefreshOutcome) -> RefreshOutcome {
        if self.store.clear() {
            outcome
        } else {
            RefreshOutcome::Discarded
        }
    }
}

pub struct ReconciliationScheduler {
    refresher: Refresher,
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl ReconciliationScheduler {
    pub fn new(
        refresher: Refresher,
        store: StoreHandle,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            refresher,
            store,
            clock,
            config,
        }
    }

    /// The fast-tick computation: display values from the held position at the current time.
    pub fn tick(&self) -> DisplayState {
        self.store.read(self.clock.now())
    }

    /// Spawn the reconciliation task. The first refresh fires immediately.
    pub fn start(self, display: Arc<watch::Sender<DisplayState>>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(shutdown_rx, trigger.clone(), display));
        SchedulerHandle {
            shutdown: shutdown_tx,
            trigger,
            task,
        }
    }

    async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        trigger: Arc<Notify>,
        display: Arc<watch::Sender<DisplayState>>,
    ) {
        let mut fast = time::interval(self.config.fast_tick);
        fast.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut slow = time::interval(self.config.refresh_interval);
        slow.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refreshes = JoinSet::new();

        info!(
            fast_tick_ms = self.config.fast_tick.as_millis() as u64,
            refresh_interval_ms = self.config.refresh_interval.as_millis() as u64,
            "reconciliation started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = fast.tick() => {
                    display.send_replace(self.tick());
                }
                _ = slow.tick() => self.spawn_refresh(&mut refreshes),
                _ = trigger.notified() => self.spawn_refresh(&mut refreshes),
                Some(joined) = refreshes.join_next() => {
                    match joined {
                        Ok(outcome) => debug!(?outcome, "refresh finished"),
                        Err(e) => warn!(error = %e, "refresh task failed"),
                    }
                    display.send_replace(self.tick());
                }
            }
        }

        // In-flight reads may finish; the disposed store drops their results.
        refreshes.detach_all();
        info!("reconciliation stopped");
    }

    fn spawn_refresh(&self, refreshes: &mut JoinSet<RefreshOutcome>) {
        let refresher = self.refresher.clone();
        refreshes.spawn(async move { refresher.refresh().await });
    }
}

/// Control handle for a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    trigger: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask for an authoritative refresh outside the regular interval.
    pub fn request_refresh(&self) {
        self.trigger.notify_one();
    }

    /// Stop both timers and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "reconciliation task ended abnormally");
        }
    }
}
