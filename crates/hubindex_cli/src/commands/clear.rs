//! Drop all documents of an endpoint, keeping its mappings.

use super::CommandResult;
use hubindex_core::{EndpointConfig, IndexManager};
use hubindex_engine::SearchEngine;
use tracing::info;

/// Clears every index of the endpoint.
pub fn run<E: SearchEngine>(manager: &IndexManager<E>, endpoint: &EndpointConfig) -> CommandResult {
    info!("Clearing indices for endpoint {}", endpoint.name);

    for logical in manager.resolver().endpoint_index_names(endpoint)? {
        let outcome = manager.clear_index_data(&logical)?;
        println!("✓ {} cleared, now {}", logical, outcome.live());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ensure, testing};
    use hubindex_engine::Document;
    use serde_json::json;

    #[test]
    fn clears_documents() {
        let (engine, manager) = testing::manager();
        let endpoint = testing::endpoint();
        ensure::run(&manager, &endpoint).unwrap();
        engine
            .upsert_document("shop__catalog__asset", &Document::new("10", json!({})))
            .unwrap();

        run(&manager, &endpoint).unwrap();
        assert!(engine.document_ids("shop__catalog__asset").is_empty());
    }

    #[test]
    fn fails_before_ensure() {
        let (_, manager) = testing::manager();
        assert!(run(&manager, &testing::endpoint()).is_err());
    }
}
