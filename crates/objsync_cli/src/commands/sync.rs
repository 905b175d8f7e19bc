//! Sync command: one pass, exit code from the statistics.

use crate::config::AgentConfig;
use tracing::{error, info, warn};

/// Performs a one-time sync and maps the outcome to an exit code.
pub fn run(config: &AgentConfig, force: bool) -> u8 {
    if force {
        info!("performing one-time sync (forced, ignoring state)");
    } else {
        info!("performing one-time sync");
    }

    let orchestrator = match super::build_orchestrator(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "failed to initialize agent");
            return 1;
        }
    };

    match orchestrator.sync(force) {
        Ok(stats) if stats.has_failures() => {
            warn!(failed = stats.files_failed, "sync completed with failures");
            1
        }
        Ok(stats) => {
            info!(
                transferred = stats.files_transferred,
                skipped = stats.files_skipped,
                bytes = stats.bytes_transferred,
                "sync completed successfully"
            );
            0
        }
        Err(err) => {
            error!(error = %err, "sync failed");
            1
        }
    }
}
