//! Test command: configuration and connectivity checks.

use crate::config::AgentConfig;
use objsync_state::StateStore;
use objsync_store::{DestinationBucket, DirBucket, SourceBucket};
use std::path::Path;

/// Checks source, destination, and state file access.
pub fn run(config: &AgentConfig) -> u8 {
    println!();
    println!("Configuration Test");
    println!("{}", "=".repeat(70));

    println!(
        "source: {} (prefix: {:?}, suffix: {:?})",
        config.source.root, config.source.prefix, config.source.suffix
    );
    match DirBucket::open(Path::new(&config.source.root), false)
        .and_then(|bucket| SourceBucket::check(&bucket))
    {
        Ok(()) => println!("  source connectivity: OK"),
        Err(err) => {
            println!("  source connectivity: FAILED - {err}");
            return 3;
        }
    }

    println!(
        "destination: {} (prefix: {:?})",
        config.destination.root, config.destination.prefix
    );
    match DirBucket::open(Path::new(&config.destination.root), true)
        .and_then(|bucket| DestinationBucket::check(&bucket))
    {
        Ok(()) => println!("  destination connectivity: OK"),
        Err(err) => {
            println!("  destination connectivity: FAILED - {err}");
            return 3;
        }
    }

    println!("state file: {}", config.state.file);
    match StateStore::open(&config.state_file()) {
        Ok(store) => {
            let summary = store.summary();
            println!(
                "  tracked files: {} ({} bytes)",
                summary.total_files, summary.total_bytes
            );
            if let Some(last_sync) = summary.last_sync_at {
                println!("  last sync: {last_sync}");
            }
        }
        Err(err) => {
            println!("  state file: FAILED - {err}");
            return 1;
        }
    }

    println!();
    println!("All tests passed!");
    println!("{}", "=".repeat(70));
    0
}
