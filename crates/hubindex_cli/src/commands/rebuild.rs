//! Rebuild every index of an endpoint from an element snapshot.

use super::CommandResult;
use hubindex_core::{
    DefaultCodec, ElementStore, EndpointConfig, IndexManager, RebuildEngine, RebuildState,
};
use hubindex_engine::SearchEngine;
use std::sync::Arc;
use tracing::info;

/// Runs a full rebuild. Fails if any element family did not finish or a
/// staged index could not be promoted.
pub fn run<E: SearchEngine, S: ElementStore>(
    manager: Arc<IndexManager<E>>,
    store: S,
    endpoint: &EndpointConfig,
) -> CommandResult {
    info!("Rebuilding endpoint {}", endpoint.name);
    let engine = RebuildEngine::new(manager, Arc::new(store), Arc::new(DefaultCodec));
    let report = engine.run(endpoint)?;

    println!("Rebuild {} ({})", report.run_id, report.strategy);
    for family in &report.types {
        println!(
            "  {:<7} {:<8} total {:>7}  indexed {:>7}  folders {:>7}  skipped {:>5}  failed {:>5}",
            family.element_type,
            family.state,
            family.total,
            family.indexed,
            family.folders_indexed,
            family.skipped,
            family.failures.len()
        );
        for failure in family.failures.iter().take(10) {
            println!("    ! {} {}: {}", failure.element_type, failure.id, failure.reason);
        }
        if family.failures.len() > 10 {
            println!("    ! ... {} more", family.failures.len() - 10);
        }
    }
    for outcome in &report.promoted {
        println!("✓ {} is live", outcome.live());
    }
    println!("  Took {:.2}s", report.duration.as_secs_f64());

    if let Some(failed) = report.types.iter().find(|t| t.state == RebuildState::Failed) {
        return Err(format!(
            "rebuild of {}s failed: {}",
            failed.element_type,
            failed.error.as_deref().unwrap_or("unknown error")
        )
        .into());
    }
    if let Some(reason) = &report.promotion_error {
        return Err(format!("promotion failed: {}", reason).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use hubindex_core::{Element, ElementType, MemoryElementStore};

    #[test]
    fn rebuilds_snapshot() {
        let (engine, manager) = testing::manager();
        let store = MemoryElementStore::from_elements([
            Element::asset_folder(1, None),
            Element::asset(10, 1),
            Element::asset(11, 1),
        ]);

        run(Arc::new(manager), store, &testing::endpoint()).unwrap();
        assert_eq!(engine.document_ids("shop__catalog__asset"), vec!["10", "11"]);
    }

    #[test]
    fn failed_family_is_an_error() {
        let (_, manager) = testing::manager();
        let store = MemoryElementStore::new();
        store.fail_queries(ElementType::Asset);
        assert!(run(Arc::new(manager), store, &testing::endpoint()).is_err());
    }
}
