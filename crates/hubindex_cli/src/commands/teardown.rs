//! Delete every index and alias of an endpoint.

use super::CommandResult;
use hubindex_core::IndexManager;
use hubindex_engine::SearchEngine;
use tracing::info;

/// Deletes the endpoint's indices. Refuses to run without `confirmed`.
pub fn run<E: SearchEngine>(manager: &IndexManager<E>, endpoint: &str, confirmed: bool) -> CommandResult {
    if !confirmed {
        return Err(format!(
            "teardown deletes every index of '{}'; pass --yes to confirm",
            endpoint
        )
        .into());
    }

    info!("Deleting all indices of endpoint {}", endpoint);
    manager.delete_all_physical_indices(endpoint)?;
    println!("✓ Deleted all indices of {}", endpoint);
    Ok(())
}
