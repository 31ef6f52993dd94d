//! Serialized mutations against the staking program.

use crate::domain::{Decimal, Position};
use crate::engine::{accrual, Clock, StoreHandle, UNITS_PER_WHOLE};
use crate::error::{MutationError, Rejection};
use crate::ledger::{Ledger, LedgerError, Receipt};
use crate::orchestration::scheduler::Refresher;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// One of the four state-changing ledger operations, with its amount already
/// converted to lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreatePosition,
    IncreaseStake { units: u64 },
    DecreaseStake { units: u64 },
    Claim,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::CreatePosition => "create_position",
            Mutation::IncreaseStake { .. } => "increase_stake",
            Mutation::DecreaseStake { .. } => "decrease_stake",
            Mutation::Claim => "claim",
        }
    }

    /// Preconditions against the last synchronized position.
    fn check(&self, position: Option<&Position>) -> Result<(), Rejection> {
        match (self, position) {
            (Mutation::CreatePosition, None) => Ok(()),
            (Mutation::CreatePosition, Some(_)) => Err(Rejection::PositionExists),
            (_, None) => Err(Rejection::NoPosition),
            (Mutation::DecreaseStake { units }, Some(position))
                if *units > position.staked_principal =>
            {
                Err(Rejection::InsufficientStake {
                    requested: *units,
                    staked: position.staked_principal,
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Failure,
}

/// User-facing result of a completed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    fn success(title: &str, message: String) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.to_string(),
            message,
        }
    }

    fn failure(error: &LedgerError) -> Self {
        Self {
            kind: NotificationKind::Failure,
            title: "Error".to_string(),
            message: error.to_string(),
        }
    }
}

/// Convert a human-facing SOL amount to lamports, truncating.
pub fn amount_to_units(amount: Decimal) -> Result<u64, Rejection> {
    if !amount.is_positive() {
        return Err(Rejection::InvalidAmount);
    }
    match amount.to_units_floor(UNITS_PER_WHOLE) {
        Some(units) if units > 0 => Ok(units),
        _ => Err(Rejection::InvalidAmount),
    }
}

/// Runs at most one mutation at a time for a single owner.
///
/// A successful mutation never writes the store directly; the forced refresh
/// that follows every mutation is the only way its effect becomes visible.
#[derive(Debug, Clone)]
pub struct MutationOrchestrator {
    ledger: Arc<dyn Ledger>,
    store: StoreHandle,
    refresher: Refresher,
    clock: Arc<dyn Clock>,
    owner: Pubkey,
    locator: Pubkey,
    notifications: broadcast::Sender<Notification>,
}

impl MutationOrchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: StoreHandle,
        refresher: Refresher,
        clock: Arc<dyn Clock>,
        owner: Pubkey,
        locator: Pubkey,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            ledger,
            store,
            refresher,
            clock,
            owner,
            locator,
            notifications,
        }
    }

    pub async fn create_position(&self) -> Result<Receipt, MutationError> {
        self.execute(Mutation::CreatePosition).await
    }

    /// Stake `amount` more SOL.
    pub async fn increase_stake(&self, amount: Decimal) -> Result<Receipt, MutationError> {
        let units = amount_to_units(amount)?;
        self.execute(Mutation::IncreaseStake { units }).await
    }

    /// Unstake `amount` SOL; must not exceed the last synchronized stake.
    pub async fn decrease_stake(&self, amount: Decimal) -> Result<Receipt, MutationError> {
        let units = amount_to_units(amount)?;
        self.execute(Mutation::DecreaseStake { units }).await
    }

    pub async fn claim(&self) -> Result<Receipt, MutationError> {
        self.execute(Mutation::Claim).await
    }

    /// Check, submit, release the busy flag, refresh, notify.
    pub async fn execute(&self, mutation: Mutation) -> Result<Receipt, MutationError> {
        let guard = self
            .store
            .try_begin_mutation(|position| mutation.check(position))?;
        let claimable = self.store.read(self.clock.now()).claimable_points;

        info!(mutation = mutation.name(), locator = %self.locator, "submitting mutation");
        let result = match mutation {
            Mutation::CreatePosition => {
                self.ledger
                    .create_position(&self.owner, &self.locator)
                    .await
            }
            Mutation::IncreaseStake { units } => {
                self.ledger
                    .increase_stake(&self.owner, &self.locator, units)
                    .await
            }
            Mutation::DecreaseStake { units } => {
                self.ledger
                    .decrease_stake(&self.owner, &self.locator, units)
                    .await
            }
            Mutation::Claim => self.ledger.claim(&self.owner, &self.locator).await,
        };

        guard.complete(result.as_ref().err());
        match &result {
            Ok(receipt) => {
                info!(mutation = mutation.name(), signature = %receipt.signature, "mutation landed")
            }
            Err(e) => warn!(mutation = mutation.name(), error = %e, "mutation failed"),
        }

        let refreshed = self.refresher.refresh_settled().await;
        debug!(mutation = mutation.name(), outcome = ?refreshed, "post-mutation refresh");

        let notification = match &result {
            Ok(_) => success_notification(mutation, claimable),
            Err(e) => Notification::failure(e),
        };
        // No subscribers is fine.
        let _ = self.notifications.send(notification);

        result.map_err(MutationError::from)
    }
}

fn success_notification(mutation: Mutation, claimable_points: u64) -> Notification {
    let sol = |units| Decimal::from_units(units, accrual::UNITS_PER_WHOLE);
    match mutation {
        Mutation::CreatePosition => Notification::success(
            "Account Created",
            "Your staking account has been created successfully!".to_string(),
        ),
        Mutation::IncreaseStake { units } => Notification::success(
            "Staked Successfully",
            format!("Staked {} SOL successfully!", sol(units)),
        ),
        Mutation::DecreaseStake { units } => Notification::success(
            "Unstaked Successfully",
            format!("Unstaked {} SOL successfully!", sol(units)),
        ),
        Mutation::Claim => Notification::success(
            "Points Claimed",
            format!("Claimed {} points successfully!", claimable_points),
        ),
    }
}
