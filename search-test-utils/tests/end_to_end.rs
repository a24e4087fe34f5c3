//! End-to-end scenarios wiring the orchestrator, indexer, reindex
//! controller and worker together over the in-memory fakes.

use hybrid_search_core::config::{ReindexConfig, RrfConfig};
use hybrid_search_core::identity::{EntityId, EntityIdType, OrganizationId, RecordId, TenantId};
use hybrid_search_core::model::{EntityConfig, FieldPolicyConfig, IndexableRecord, JobPayload, Presenter, ReindexLockType, TenantScope};
use hybrid_search_index::encryption::EncryptionService;
use hybrid_search_index::entity_config::{DefaultHooks, EntityConfigRegistry};
use hybrid_search_queue::lock_store::LockStore;
use hybrid_search_index::enricher::PresenterEnricher;
use hybrid_search_index::indexer::Indexer;
use hybrid_search_index::orchestrator::{OrchestratorHandle, SearchOptions, SearchOrchestrator};
use hybrid_search_index::row::Row;
use hybrid_search_queue::queue::{JobContext, JobHandler};
use hybrid_search_queue::reindex::{ReindexController, ReindexMode};
use hybrid_search_queue::worker::{InMemoryCoverageAdjuster, IndexingWorker};
use hybrid_search_strategies::fulltext::FulltextStrategy;
use hybrid_search_strategies::token::{InMemoryTokenStore, TokenStrategy};
use hybrid_search_strategies::vector::VectorStrategy;
use hybrid_search_strategies::Strategy;
use hybrid_search_test_utils::{FakeEmbeddingProvider, FakeEncryptionService, FakeFulltextDriver, FakeLockStore, FakePrimaryStore, FakeVectorDriver};
use std::sync::Arc;

fn contact_entity() -> EntityId {
    EntityId::new("crm:contact")
}

fn scope(tenant_id: TenantId) -> TenantScope {
    TenantScope::tenant_only(tenant_id)
}

fn build_strategies() -> Vec<Arc<dyn Strategy>> {
    let token: Arc<dyn Strategy> = Arc::new(TokenStrategy::new(InMemoryTokenStore::new()));
    let vector: Arc<dyn Strategy> = Arc::new(VectorStrategy::new(Arc::new(FakeVectorDriver::new()), Arc::new(FakeEmbeddingProvider::new(8))));
    let fulltext: Arc<dyn Strategy> = Arc::new(FulltextStrategy::new(Arc::new(FakeFulltextDriver::new()), Default::default()));
    vec![fulltext, vector, token]
}

#[tokio::test]
async fn search_fans_out_across_strategies_and_enriches_missing_presenters() {
    let tenant_id = TenantId::now_v7();
    let scope = scope(tenant_id);
    let primary_store = Arc::new(FakePrimaryStore::new());
    let entity_id = contact_entity();

    primary_store.insert_entity_index_doc(&entity_id, &scope, "1", serde_json::json!({"display_name": "Ada Lovelace", "email": "ada@example.com"}));

    let mut registry = EntityConfigRegistry::new();
    registry.register(
        EntityConfig { entity_id: entity_id.clone(), enabled: true, strategies: None, priority: 0, field_policy: FieldPolicyConfig::default() },
        Arc::new(DefaultHooks),
    );
    let registry = Arc::new(registry);

    let strategies = build_strategies();
    let enricher = Arc::new(PresenterEnricher::new(primary_store.clone(), Arc::new(FakeEncryptionService::new()), registry.clone(), 500));
    let orchestrator = Arc::new(SearchOrchestrator::new(strategies, None, Some(enricher), RrfConfig::default()));

    let mut record = IndexableRecord::new(entity_id.clone(), RecordId::new("1"), scope.clone());
    record.fields.insert("name".to_string(), serde_json::json!("Ada Lovelace"));
    record.text.push("Ada Lovelace, mathematician".to_string());
    orchestrator.index(&record).await.unwrap();

    let hits = orchestrator.search("Ada Lovelace", scope, SearchOptions::default()).await;
    assert!(!hits.is_empty());
    let hit = hits.into_iter().find(|h| h.record_id == RecordId::new("1")).expect("indexed record surfaces in search results");
    assert_eq!(hit.presenter.as_ref().and_then(|p| p.title.clone()), Some("Ada Lovelace".to_string()));
    assert!(hit.metadata.contains_key("_sources"));
    assert!(hit.metadata.contains_key("_rrfScore"));
}

#[tokio::test]
async fn encrypted_looking_presenter_is_replaced_by_a_decrypted_one_during_enrichment() {
    let tenant_id = TenantId::now_v7();
    let scope = scope(tenant_id);
    let entity_id = contact_entity();
    let primary_store = Arc::new(FakePrimaryStore::new());
    primary_store.insert_entity_index_doc(&entity_id, &scope, "2", serde_json::json!({"display_name": "Grace Hopper"}));

    let mut registry = EntityConfigRegistry::new();
    registry.register(
        EntityConfig { entity_id: entity_id.clone(), enabled: true, strategies: None, priority: 0, field_policy: FieldPolicyConfig::default() },
        Arc::new(DefaultHooks),
    );
    let registry = Arc::new(registry);
    let enricher = PresenterEnricher::new(primary_store, Arc::new(FakeEncryptionService::new()), registry, 500);

    let encrypted_presenter = Presenter { title: Some("a:b:c:v1".to_string()), subtitle: None, icon: None, badge: None };
    assert!(encrypted_presenter.looks_encrypted());

    let mut hit = hybrid_search_core::model::SearchResult {
        entity_id: entity_id.clone(),
        record_id: RecordId::new("2"),
        score: 1.0,
        source: "fulltext".to_string(),
        presenter: Some(encrypted_presenter),
        url: None,
        links: Vec::new(),
        metadata: Default::default(),
    };
    assert!(hit.needs_enrichment());

    let enriched = enricher.enrich(vec![hit.clone()], &scope).await;
    hit = enriched.into_iter().next().unwrap();
    assert_eq!(hit.presenter.as_ref().and_then(|p| p.title.clone()), Some("Grace Hopper".to_string()));
}

#[tokio::test]
async fn a_failing_strategy_does_not_prevent_the_others_from_returning_results() {
    let tenant_id = TenantId::now_v7();
    let scope = scope(tenant_id);
    let entity_id = contact_entity();

    let token: Arc<dyn Strategy> = Arc::new(TokenStrategy::new(InMemoryTokenStore::new()));
    let unavailable_vector: Arc<dyn Strategy> = Arc::new(VectorStrategy::new(Arc::new(FakeVectorDriver::new()), Arc::new(FakeEmbeddingProvider::unavailable(8))));
    let orchestrator = SearchOrchestrator::new(vec![token.clone(), unavailable_vector], None, None, RrfConfig::default());

    let mut record = IndexableRecord::new(entity_id, RecordId::new("9"), scope.clone());
    record.hash_only_fields.insert("ssn".to_string(), serde_json::json!("000-11-2222"));
    orchestrator.index(&record).await.unwrap();

    let hits = orchestrator.search("000-11-2222", scope, SearchOptions::default()).await;
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn queued_reindex_batches_rows_into_batch_index_jobs_and_heartbeats_the_lock() {
    use hybrid_search_queue::queue::Queue;

    let tenant_id = TenantId::now_v7();
    let scope = scope(tenant_id);
    let entity_id = contact_entity();
    let primary_store = Arc::new(FakePrimaryStore::new());
    for i in 0..5 {
        primary_store.insert_row(&entity_id, &scope, Row { id: i.to_string(), fields: Default::default() });
    }

    let mut registry = EntityConfigRegistry::new();
    registry.register(
        EntityConfig { entity_id: entity_id.clone(), enabled: true, strategies: None, priority: 0, field_policy: FieldPolicyConfig::default() },
        Arc::new(DefaultHooks),
    );
    let registry = Arc::new(registry);

    let orchestrator: Arc<dyn OrchestratorHandle> = Arc::new(SearchOrchestrator::new(build_strategies(), None, None, RrfConfig::default()));
    let indexer = Arc::new(Indexer::new(registry, primary_store, orchestrator, Arc::new(|_: &EntityId| Vec::new())));

    let locks = Arc::new(FakeLockStore::new());
    let mut config = ReindexConfig::default();
    config.direct_page_size = 2;
    let controller = ReindexController::new(indexer, locks.clone(), config);

    let queue: Arc<dyn Queue> = Arc::new(hybrid_search_queue::in_process::InProcessQueue::new("vector-indexing"));
    let report = controller.reindex_entity(&entity_id, scope.clone(), ReindexLockType::Vector, ReindexMode::Queued, false, Some(queue.clone()), None).await.unwrap();

    assert!(report.success);
    assert_eq!(report.records_indexed, 5);
    assert_eq!(report.jobs_enqueued, 3);
    assert!(locks.read(&tenant_id, ReindexLockType::Vector).await.unwrap().is_some(), "queued mode leaves the lock for idle-queue reclaim");
}

#[tokio::test]
async fn fulltext_and_vector_reindex_locks_on_the_same_tenant_are_independent() {
    let tenant_id = TenantId::now_v7();
    let locks = FakeLockStore::new();
    let now = chrono::Utc::now();

    let fulltext_lock = hybrid_search_core::model::ReindexLock {
        lock_type: ReindexLockType::Fulltext,
        action: "reindex".to_string(),
        tenant_id,
        organization_id: None,
        started_at: now,
        last_heartbeat_at: now,
    };
    assert!(hybrid_search_queue::lock_store::LockStore::acquire(&locks, fulltext_lock).await.unwrap());

    let vector_lock = hybrid_search_core::model::ReindexLock {
        lock_type: ReindexLockType::Vector,
        action: "reindex".to_string(),
        tenant_id,
        organization_id: None,
        started_at: now,
        last_heartbeat_at: now,
    };
    assert!(hybrid_search_queue::lock_store::LockStore::acquire(&locks, vector_lock).await.unwrap(), "a vector lock must not be blocked by an already-held fulltext lock on the same tenant");
}

#[tokio::test]
async fn indexing_worker_applies_coverage_deltas_and_skips_when_autoindexing_is_disabled() {
    let tenant_id = TenantId::now_v7();
    let scope = scope(tenant_id);
    let entity_id = contact_entity();
    let primary_store = Arc::new(FakePrimaryStore::new());
    primary_store.insert_row(&entity_id, &scope, Row { id: "7".to_string(), fields: Default::default() });

    let mut registry = EntityConfigRegistry::new();
    registry.register(
        EntityConfig { entity_id: entity_id.clone(), enabled: true, strategies: None, priority: 0, field_policy: FieldPolicyConfig::default() },
        Arc::new(DefaultHooks),
    );
    let registry = Arc::new(registry);
    let orchestrator: Arc<dyn OrchestratorHandle> = Arc::new(SearchOrchestrator::new(build_strategies(), None, None, RrfConfig::default()));
    let indexer = Arc::new(Indexer::new(registry, primary_store, orchestrator, Arc::new(|_: &EntityId| Vec::new())));

    let coverage = Arc::new(InMemoryCoverageAdjuster::default());
    let worker = IndexingWorker::new(indexer.clone(), coverage.clone(), false);
    let payload = JobPayload::Index { entity_type: entity_id.clone(), record_id: RecordId::new("7"), tenant_id, organization_id: None::<OrganizationId> };
    worker.handle(payload.clone(), JobContext { job_id: "1".to_string(), attempt_number: 1 }).await.unwrap();
    assert_eq!(coverage.total(), 1);

    let disabled_worker = IndexingWorker::new(indexer, coverage.clone(), true);
    disabled_worker.handle(payload, JobContext { job_id: "2".to_string(), attempt_number: 1 }).await.unwrap();
    assert_eq!(coverage.total(), 1, "autoindexing_disabled must short-circuit before any coverage change");
}
