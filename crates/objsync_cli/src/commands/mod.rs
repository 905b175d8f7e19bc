//! Command implementations.

pub mod run;
pub mod sync;
pub mod test;

use crate::config::AgentConfig;
use objsync_engine::Orchestrator;
use objsync_state::StateStore;
use objsync_store::{DestinationBucket, DirBucket, SourceBucket};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

/// Wires the buckets, state store, and orchestrator from configuration.
pub(crate) fn build_orchestrator(config: &AgentConfig) -> Result<Arc<Orchestrator>, Box<dyn Error>> {
    let source = Arc::new(DirBucket::open(Path::new(&config.source.root), false)?);
    let destination = Arc::new(DirBucket::open(Path::new(&config.destination.root), true)?);
    let state = Arc::new(StateStore::open(&config.state_file())?);

    Ok(Arc::new(Orchestrator::new(
        config.sync_config(),
        source as Arc<dyn SourceBucket>,
        destination as Arc<dyn DestinationBucket>,
        state,
    )))
}
