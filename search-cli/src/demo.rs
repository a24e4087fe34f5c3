//! In-memory assembly built from the test-tooling crate's fakes. Every
//! subcommand runs against a freshly constructed instance, so state never
//! persists across invocations; this is the "no real drivers configured"
//! path documented for the CLI.

use hybrid_search_core::config::RrfConfig;
use hybrid_search_core::identity::EntityId;
use hybrid_search_core::model::{EntityConfig, FieldPolicyConfig};
use hybrid_search_index::entity_config::{DefaultHooks, EntityConfigRegistry};
use hybrid_search_index::indexer::Indexer;
use hybrid_search_index::orchestrator::{OrchestratorHandle, SearchOrchestrator};
use hybrid_search_queue::lock_store::LockStore;
use hybrid_search_strategies::fulltext::FulltextStrategy;
use hybrid_search_strategies::token::{InMemoryTokenStore, TokenStrategy};
use hybrid_search_strategies::vector::VectorStrategy;
use hybrid_search_strategies::Strategy;
use hybrid_search_test_utils::{FakeEmbeddingProvider, FakeFulltextDriver, FakeLockStore, FakePrimaryStore, FakeVectorDriver};
use std::sync::Arc;

const DEMO_EMBEDDING_DIMENSIONS: usize = 16;

pub struct DemoAssembly {
    pub registry: Arc<EntityConfigRegistry>,
    pub primary_store: Arc<FakePrimaryStore>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub indexer: Arc<Indexer>,
    pub locks: Arc<dyn LockStore>,
    pub strategies: Vec<Arc<dyn Strategy>>,
}

impl DemoAssembly {
    pub fn new() -> Self {
        let strategies: Vec<Arc<dyn Strategy>> = vec![
            Arc::new(FulltextStrategy::new(Arc::new(FakeFulltextDriver::new()), Default::default())),
            Arc::new(VectorStrategy::new(Arc::new(FakeVectorDriver::new()), Arc::new(FakeEmbeddingProvider::new(DEMO_EMBEDDING_DIMENSIONS)))),
            Arc::new(TokenStrategy::new(InMemoryTokenStore::new())),
        ];

        let mut registry = EntityConfigRegistry::new();
        registry.register(
            EntityConfig { entity_id: EntityId::new("crm:contact"), enabled: true, strategies: None, priority: 0, field_policy: FieldPolicyConfig::default() },
            Arc::new(DefaultHooks),
        );
        let registry = Arc::new(registry);

        let orchestrator = Arc::new(SearchOrchestrator::new(strategies.clone(), None, None, RrfConfig::default()));
        let orchestrator_handle: Arc<dyn OrchestratorHandle> = orchestrator.clone();

        let primary_store = Arc::new(FakePrimaryStore::new());
        let indexer = Arc::new(Indexer::new(registry.clone(), primary_store.clone(), orchestrator_handle, Arc::new(|_: &EntityId| Vec::new())));

        Self { registry, primary_store, orchestrator, indexer, locks: Arc::new(FakeLockStore::new()), strategies }
    }
}
