//! # objsync state
//!
//! Durable transfer state for the mirror agent.
//!
//! The entire state is one JSON snapshot: a map from destination key to the
//! record of the last successful transfer, plus the time of the last sync.
//! The snapshot is loaded fully into memory, mutated under a single writer
//! lock, and flushed with a write-then-rename so the on-disk file is always
//! either the previous or the new fully-consistent version.
//!
//! ## Key invariants
//!
//! - A record for key K means a byte-identical object was successfully
//!   placed at destination K as of `transferred_at`.
//! - Load failures are non-fatal: a missing or corrupt file yields an empty
//!   snapshot and a log entry, never a startup abort.
//! - One process per state file, enforced with an advisory lock.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;
mod store;

pub use error::{StateError, StateResult};
pub use record::{Snapshot, TransferRecord, SNAPSHOT_VERSION};
pub use store::{StateStore, StateSummary};
