//! Delete stale unbound indices left by interrupted migrations.

use super::CommandResult;
use hubindex_core::{EndpointConfig, IndexManager};
use hubindex_engine::SearchEngine;
use tracing::info;

/// Prunes every index of the endpoint.
pub fn run<E: SearchEngine>(manager: &IndexManager<E>, endpoint: &EndpointConfig) -> CommandResult {
    info!("Pruning stale indices for endpoint {}", endpoint.name);

    let mut pruned = 0;
    for logical in manager.resolver().endpoint_index_names(endpoint)? {
        if let Some(stale) = manager.prune_stale(&logical)? {
            println!("✓ Deleted {}", stale);
            pruned += 1;
        }
    }
    println!("{} stale index(es) removed", pruned);
    Ok(())
}
