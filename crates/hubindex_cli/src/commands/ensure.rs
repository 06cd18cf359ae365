//! Create missing indices and migrate changed mappings.

use super::CommandResult;
use hubindex_core::{EndpointConfig, EnsureOutcome, IndexManager, ReconcileOutcome};
use hubindex_engine::SearchEngine;
use tracing::info;

/// Runs `ensure` for every index of the endpoint.
pub fn run<E: SearchEngine>(manager: &IndexManager<E>, endpoint: &EndpointConfig) -> CommandResult {
    info!("Ensuring indices for endpoint {}", endpoint.name);

    for logical in manager.resolver().endpoint_index_names(endpoint)? {
        let mapping = endpoint.mapping_for(logical.tag());
        match manager.ensure_index(&logical, &mapping)? {
            EnsureOutcome::Created { live } => println!("✓ {} created ({})", logical, live),
            EnsureOutcome::Reconciled(ReconcileOutcome::Unchanged { live }) => {
                println!("  {} unchanged ({})", logical, live)
            }
            EnsureOutcome::Reconciled(ReconcileOutcome::Migrated {
                from,
                to,
                source_dropped,
            }) => {
                println!("✓ {} migrated {} -> {}", logical, from, to);
                if !source_dropped {
                    println!("  ! {} was not deleted, run `prune`", from);
                }
            }
        }
    }
    Ok(())
}
