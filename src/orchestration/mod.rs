//! Async coordination: reconciliation timers, serialized mutations, sessions.

pub mod orchestrator;
pub mod scheduler;
pub mod session;

pub use orchestrator::{Mutation, MutationOrchestrator, Notification, NotificationKind};
pub use scheduler::{
    ReconciliationScheduler, RefreshOutcome, Refresher, SchedulerConfig, SchedulerHandle,
};
pub use session::Session;
