//! Synchronous core: accrual math, wall clock, and the position store.
//!
//! Nothing in here suspends; the only `.await` points in the crate are ledger calls.

pub mod accrual;
pub mod clock;
pub mod store;

pub use accrual::{accrued, POINTS_SCALE, UNITS_PER_WHOLE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{MutationGuard, PositionStore, RefreshGuard, ReplaceOutcome, StoreHandle};
