pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orchestration;

pub use config::Config;
pub use domain::{Decimal, DecodeError, DisplayState, Locator, Position};
pub use engine::{Clock, ManualClock, StoreHandle, SystemClock};
pub use error::{MutationError, Rejection};
pub use ledger::{Ledger, LedgerError, MockLedger, Receipt, RpcLedger};
pub use orchestration::{
    MutationOrchestrator, Notification, NotificationKind, RefreshOutcome, Refresher,
    SchedulerConfig, Session,
};
