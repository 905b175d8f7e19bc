//! Run command: foreground scheduler loop.

use crate::config::AgentConfig;
use objsync_engine::Scheduler;
use tracing::{error, info};

/// Runs the scheduler loop until the process is stopped.
pub fn run(config: &AgentConfig) -> u8 {
    let orchestrator = match super::build_orchestrator(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "failed to initialize agent");
            return 1;
        }
    };

    info!("starting agent in foreground mode (Ctrl+C to stop)");
    let scheduler = Scheduler::new(config.poll_interval(), orchestrator);
    scheduler.run_forever();
    0
}
