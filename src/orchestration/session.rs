//! One owner's store, scheduler, and orchestrator, wired together.

use crate::domain::{locator, DisplayState, Locator};
use crate::engine::{Clock, StoreHandle};
use crate::ledger::Ledger;
use crate::orchestration::orchestrator::{MutationOrchestrator, Notification};
use crate::orchestration::scheduler::{
    ReconciliationScheduler, RefreshOutcome, Refresher, SchedulerConfig, SchedulerHandle,
};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

const NOTIFICATION_CAPACITY: usize = 16;

/// The engine for a single owner identity.
///
/// Created idle; [`Session::start`] launches the reconciliation timers and
/// [`Session::stop`] tears everything down.
pub struct Session {
    owner: Pubkey,
    locator: Locator,
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    refresher: Refresher,
    orchestrator: MutationOrchestrator,
    display_tx: Arc<watch::Sender<DisplayState>>,
    display_rx: watch::Receiver<DisplayState>,
    notifications: broadcast::Sender<Notification>,
    scheduler: Option<SchedulerHandle>,
}

impl Session {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        owner: Pubkey,
        program_id: Pubkey,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let locator = locator::derive(&owner, &program_id);
        let store = StoreHandle::new();
        let refresher = Refresher::new(ledger.clone(), store.clone(), owner, locator.address);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let orchestrator = MutationOrchestrator::new(
            ledger,
            store.clone(),
            refresher.clone(),
            clock.clone(),
            owner,
            locator.address,
            notifications.clone(),
        );
        let (display_tx, display_rx) = watch::channel(store.read(clock.now()));

        Self {
            owner,
            locator,
            store,
            clock,
            config,
            refresher,
            orchestrator,
            display_tx: Arc::new(display_tx),
            display_rx,
            notifications,
            scheduler: None,
        }
    }

    /// Start the fast tick and slow refresh. A refresh runs immediately.
    pub fn start(&mut self) {
        if self.scheduler.is_some() {
            warn!(owner = %self.owner, "session already started");
            return;
        }
        if self.store.is_disposed() {
            warn!(owner = %self.owner, "cannot start a stopped session");
            return;
        }
        let scheduler = ReconciliationScheduler::new(
            self.refresher.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.config,
        );
        self.scheduler = Some(scheduler.start(self.display_tx.clone()));
        info!(owner = %self.owner, locator = %self.locator.address, "session started");
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn orchestrator(&self) -> &MutationOrchestrator {
        &self.orchestrator
    }

    /// Current display values, recomputed now.
    pub fn read(&self) -> DisplayState {
        self.store.read(self.clock.now())
    }

    /// Display snapshots as published by the scheduler.
    pub fn display(&self) -> watch::Receiver<DisplayState> {
        self.display_rx.clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Run an authoritative refresh and wait for it.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let outcome = self.refresher.refresh().await;
        self.display_tx.send_replace(self.read());
        outcome
    }

    /// Ask the running scheduler for a refresh without waiting.
    pub fn request_refresh(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler.request_refresh(),
            None => warn!(owner = %self.owner, "refresh requested on idle session"),
        }
    }

    /// Stop both timers and dispose of the store.
    ///
    /// Ledger calls still in flight may complete, but nothing they return is written.
    pub async fn stop(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
        self.store.dispose();
        self.display_tx.send_replace(self.read());
        info!(owner = %self.owner, "session stopped");
    }
}
