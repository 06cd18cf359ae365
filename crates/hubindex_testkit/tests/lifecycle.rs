//! Lifecycle scenarios against the in-memory engine.

use hubindex_core::{
    CoreError, EnsureOutcome, IndexManager, IndexerConfig, LogicalIndexName, ReconcileOptions,
    ReconcileOutcome, RebuildStrategy,
};
use hubindex_engine::{Document, EngineCall, Fault, InMemoryEngine, SearchEngine};
use hubindex_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn catalog() -> (Arc<InMemoryEngine>, IndexManager<InMemoryEngine>, LogicalIndexName) {
    let engine = Arc::new(InMemoryEngine::new());
    let manager = IndexManager::new(engine.clone(), IndexerConfig::new(TEST_PREFIX));
    let endpoint = asset_endpoint("catalog");
    let asset = manager
        .resolver()
        .endpoint_index_names(&endpoint)
        .unwrap()
        .into_iter()
        .find(|name| name.tag() == "asset")
        .unwrap();
    (engine, manager, asset)
}

#[test]
fn catalog_asset_index_lifecycle() {
    let (engine, manager, asset) = catalog();
    let base = mapping(&[("key", "keyword")]);

    // First call: no alias yet.
    let created = manager.ensure_index(&asset, &base).unwrap();
    assert!(matches!(created, EnsureOutcome::Created { .. }));
    assert_eq!(engine.indices(), vec!["prefix__catalog__asset-even"]);
    assert_eq!(
        engine.alias_target("prefix__catalog__asset").as_deref(),
        Some("prefix__catalog__asset-even")
    );

    engine
        .upsert_document(asset.as_str(), &Document::new("10", json!({"key": "a.png"})))
        .unwrap();

    // Identical mapping: nothing changes.
    engine.clear_calls();
    manager.ensure_index(&asset, &base).unwrap();
    assert!(engine.mutating_calls().is_empty());

    // Added field: odd is built, filled, swapped in, even is dropped.
    engine.clear_calls();
    let extended = mapping(&[("key", "keyword"), ("color", "text")]);
    let outcome = manager.ensure_index(&asset, &extended).unwrap();
    assert_eq!(outcome.live().as_str(), "prefix__catalog__asset-odd");
    assert_eq!(
        engine.mutating_calls(),
        vec![
            EngineCall::CreateIndex("prefix__catalog__asset-odd".into()),
            EngineCall::Reindex {
                source: "prefix__catalog__asset-even".into(),
                target: "prefix__catalog__asset-odd".into(),
            },
            EngineCall::CreateAlias {
                index: "prefix__catalog__asset-odd".into(),
                alias: "prefix__catalog__asset".into(),
            },
            EngineCall::DeleteIndex("prefix__catalog__asset-even".into()),
        ]
    );
    assert_eq!(engine.indices(), vec!["prefix__catalog__asset-odd"]);
    assert!(engine.document(asset.as_str(), "10").is_some());
    assert_eq!(engine.mapping("prefix__catalog__asset-odd"), Some(extended));
}

#[test]
fn swap_back_and_forth() {
    let (engine, manager, asset) = catalog();
    manager.ensure_index(&asset, &mapping(&[("a", "keyword")])).unwrap();

    let mut previous = manager.resolver().physical_name(&asset).unwrap();
    for round in 0..4 {
        let field = format!("f{}", round);
        let outcome = manager
            .reconcile_mapping(
                &asset,
                &mapping(&[("a", "keyword"), (field.as_str(), "text")]),
                ReconcileOptions::default(),
            )
            .unwrap();

        let live = outcome.live().clone();
        assert_eq!(live, previous.sibling());
        assert_eq!(engine.aliases_of(live.as_str()), vec![asset.to_string()]);
        assert!(!engine.index_exists(previous.as_str()).unwrap());
        previous = live;
    }
}

#[test]
fn clear_then_reuse() {
    let (engine, manager, asset) = catalog();
    manager.ensure_index(&asset, &mapping(&[("key", "keyword")])).unwrap();
    for id in ["1", "2", "3"] {
        engine
            .upsert_document(asset.as_str(), &Document::new(id, json!({})))
            .unwrap();
    }

    manager.clear_index_data(&asset).unwrap();
    assert!(engine.document_ids(asset.as_str()).is_empty());

    // The cleared index keeps the mapping, so the same mapping is a no-op.
    let outcome = manager
        .reconcile_mapping(&asset, &mapping(&[("key", "keyword")]), ReconcileOptions::default())
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Unchanged { .. }));
}

#[test]
fn clear_on_empty_mapping_is_refused() {
    let (_, manager, asset) = catalog();
    manager.ensure_index(&asset, &hubindex_core::Mapping::new()).unwrap();
    assert!(matches!(
        manager.clear_index_data(&asset),
        Err(CoreError::NoMappingFound { .. })
    ));
}

#[test]
fn failed_migration_keeps_serving_old_index() {
    let (engine, manager, asset) = catalog();
    manager.ensure_index(&asset, &mapping(&[("key", "keyword")])).unwrap();
    engine
        .upsert_document(asset.as_str(), &Document::new("7", json!({})))
        .unwrap();
    engine.inject(Fault::ReindexFailures(1));

    let err = manager
        .ensure_index(&asset, &mapping(&[("key", "text")]))
        .unwrap_err();
    assert!(err.is_migration_failure());
    assert_eq!(
        engine.alias_target(asset.as_str()).as_deref(),
        Some("prefix__catalog__asset-even")
    );
    assert!(engine.document(asset.as_str(), "7").is_some());

    // The half-built target is replaced on retry.
    engine.clear_faults();
    let outcome = manager
        .ensure_index(&asset, &mapping(&[("key", "text")]))
        .unwrap();
    assert_eq!(outcome.live().as_str(), "prefix__catalog__asset-odd");
    assert!(engine.document(asset.as_str(), "7").is_some());
}

#[test]
fn unavailable_engine_surfaces_as_engine_error() {
    let (engine, manager, asset) = catalog();
    engine.inject(Fault::Unavailable);
    let err = manager
        .ensure_index(&asset, &mapping(&[("key", "keyword")]))
        .unwrap_err();
    match err {
        CoreError::Engine(e) => assert!(e.is_retryable()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn teardown_removes_whole_endpoint() {
    let harness = TestHarness::with_config(
        CorpusBuilder::new().assets(10..12, 1).build(),
        IndexerConfig::new(TEST_PREFIX).with_strategy(RebuildStrategy::Staged),
    );
    harness.rebuild.run(&asset_endpoint("catalog")).unwrap();
    harness.rebuild.run(&asset_endpoint("catalogue")).unwrap();
    assert_eq!(harness.engine.indices().len(), 4);

    harness.manager.delete_all_physical_indices("catalog").unwrap();
    assert_eq!(
        harness.engine.indices(),
        vec![
            "prefix__catalogue__asset-odd".to_string(),
            "prefix__catalogue__assetfolder-odd".to_string(),
        ]
    );
    assert_eq!(harness.live_index("catalog", "asset"), None);
    assert!(harness.live_index("catalogue", "asset").is_some());
}

#[test]
fn status_reports_live_and_documents() {
    let harness = TestHarness::new(CorpusBuilder::new().assets(10..15, 1).build());
    harness.rebuild.run(&asset_endpoint("catalog")).unwrap();

    let status = harness
        .manager
        .status(&harness.logical("catalog", "asset"))
        .unwrap();
    assert_eq!(
        status.live.map(|p| p.to_string()).as_deref(),
        Some("prefix__catalog__asset-odd")
    );
    assert_eq!(status.orphan, None);
    assert_eq!(status.documents, Some(5));

    let missing = harness
        .manager
        .status(&harness.logical("catalog", "car"))
        .unwrap();
    assert_eq!(missing.live, None);
    assert_eq!(missing.documents, None);
}
