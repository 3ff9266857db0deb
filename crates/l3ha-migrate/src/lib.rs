//! Router migration and evacuation.
//!
//! The orchestrator decides which routers have to leave which agent,
//! asks the configured picker for a destination, and drives the
//! detach/attach sequence against the control plane. One router failing
//! never stops the batch.
//!
//! # Components
//!
//! - **`orchestrator`**: migrate, evacuate, check, rebalance
//! - **`retry`**: bounded polling with backoff for the drain wait
//! - **`error`**: per-router failure reasons

pub mod error;
pub mod orchestrator;
pub mod retry;

pub use error::{MigrateError, MigrateResult};
pub use orchestrator::{
    DEFAULT_TAKEOVER_DELAY, MigrationOrchestrator, MigrationSettings, RunReport, RunStatus,
};
pub use retry::{RetryPolicy, WaitError};
