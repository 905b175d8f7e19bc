//! # objsync engine
//!
//! The state-synchronized transfer pipeline.
//!
//! This crate provides:
//! - Orchestrator (listing → diff → bounded-parallel transfer → persist →
//!   cleanup)
//! - Transfer executor with per-object retry/backoff and streaming checksums
//! - Retry policy (pure exponential backoff, no jitter)
//! - Scheduler loop with cooperative shutdown
//! - Aggregate sync statistics
//!
//! ## Key invariants
//!
//! - Each unchanged object is transferred at most once; the skip gate is
//!   the persisted state, keyed by destination key
//! - Passes never overlap; transfers within a pass run on a bounded worker
//!   pool
//! - Per-object failures never abort a pass; a listing failure aborts the
//!   pass before any transfer is attempted
//! - State mutation is serialized and crash-consistent (atomic snapshot
//!   replace, handled by `objsync_state`)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod orchestrator;
mod scheduler;
mod stats;

pub use config::{RetryPolicy, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use executor::{TransferExecutor, TransferOutcome};
pub use orchestrator::Orchestrator;
pub use scheduler::{Scheduler, SchedulerState, ShutdownHandle};
pub use stats::{SyncPhase, SyncStats};
