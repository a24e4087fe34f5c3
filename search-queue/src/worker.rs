//! Idempotent job consumers. Missing required fields are a skip, not an
//! error; unhandled failures are re-thrown so the queue's retry policy
//! applies.

use crate::queue::{JobContext, JobHandler};
use async_trait::async_trait;
use hybrid_search_core::model::JobPayload;
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_index::indexer::{IndexOutcome, Indexer};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Applies a net coverage delta to a query-index coverage counter the host
/// application tracks externally; `+1` on a new index, `-1` on a deleted
/// one, `0` otherwise. Returns `false` when the delta could not be applied
/// locally, signaling the caller to fall back to a `coverage.refresh` event.
pub trait CoverageAdjuster: Send + Sync {
    fn adjust(&self, entity_id: &str, tenant_id: &str, delta: i64) -> bool;
}

/// In-memory coverage adjuster usable as a default/test double. Always
/// applies locally.
#[derive(Default)]
pub struct InMemoryCoverageAdjuster {
    total: AtomicI64,
}

impl InMemoryCoverageAdjuster {
    pub fn total(&self) -> i64 {
        self.total.load(Ordering::SeqCst)
    }
}

impl CoverageAdjuster for InMemoryCoverageAdjuster {
    fn adjust(&self, _entity_id: &str, _tenant_id: &str, delta: i64) -> bool {
        self.total.fetch_add(delta, Ordering::SeqCst);
        true
    }
}

/// Reads namespaced values from the module-config store; embedding-provider
/// settings live under `vector/embedding_provider`.
#[async_trait]
pub trait ModuleConfigSource: Send + Sync {
    async fn get_value(&self, namespace: &str, key: &str) -> Outcome<Option<Value>>;
}

/// Applies a freshly loaded embedding-provider configuration to the live
/// embedding service.
pub trait EmbeddingConfigUpdater: Send + Sync {
    fn apply(&self, config: Value);
}

/// Publishes `query_index.coverage.refresh` when a coverage delta could not
/// be applied locally.
#[async_trait]
pub trait CoverageRefreshPublisher: Send + Sync {
    async fn publish_coverage_refresh(&self, entity_id: &str, tenant_id: &str) -> Outcome<()>;
}

pub struct IndexingWorker {
    indexer: Arc<Indexer>,
    coverage: Arc<dyn CoverageAdjuster>,
    autoindexing_disabled: bool,
    heartbeat: Option<Arc<dyn Fn() + Send + Sync>>,
    module_config: Option<Arc<dyn ModuleConfigSource>>,
    embedding_updater: Option<Arc<dyn EmbeddingConfigUpdater>>,
    coverage_refresh: Option<Arc<dyn CoverageRefreshPublisher>>,
}

impl IndexingWorker {
    pub fn new(indexer: Arc<Indexer>, coverage: Arc<dyn CoverageAdjuster>, autoindexing_disabled: bool) -> Self {
        Self { indexer, coverage, autoindexing_disabled, heartbeat: None, module_config: None, embedding_updater: None, coverage_refresh: None }
    }

    pub fn with_heartbeat(mut self, heartbeat: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Wires a module-config reader and the embedding-service updater it
    /// feeds; every handled job reloads `vector/embedding_provider` and
    /// applies it before doing any indexing work.
    pub fn with_embedding_config(mut self, module_config: Arc<dyn ModuleConfigSource>, updater: Arc<dyn EmbeddingConfigUpdater>) -> Self {
        self.module_config = Some(module_config);
        self.embedding_updater = Some(updater);
        self
    }

    pub fn with_coverage_refresh_publisher(mut self, publisher: Arc<dyn CoverageRefreshPublisher>) -> Self {
        self.coverage_refresh = Some(publisher);
        self
    }

    /// Loads `vector/embedding_provider` from the module-config service and
    /// applies it to the embedding service; failures are warnings for
    /// `index`/`batch-index` jobs, silent for `delete`/`purge`.
    async fn refresh_embedding_config(&self, warn_on_failure: bool) {
        let (Some(module_config), Some(updater)) = (&self.module_config, &self.embedding_updater) else {
            return;
        };
        match module_config.get_value("vector", "embedding_provider").await {
            Ok(Some(config)) => updater.apply(config),
            Ok(None) => {}
            Err(err) if warn_on_failure => {
                tracing::warn!(error = %err, "failed to load embedding-provider configuration from module-config service");
            }
            Err(_) => {}
        }
    }

    /// Applies a coverage delta; if it could not be applied locally, emits
    /// a `coverage.refresh` event instead.
    async fn apply_coverage_delta(&self, entity_id: &str, tenant_id: &str, delta: i64) {
        if self.coverage.adjust(entity_id, tenant_id, delta) {
            return;
        }
        let Some(publisher) = &self.coverage_refresh else { return };
        if let Err(err) = publisher.publish_coverage_refresh(entity_id, tenant_id).await {
            tracing::warn!(error = %err, "failed to publish coverage.refresh event");
        }
    }
}

#[async_trait]
impl JobHandler for IndexingWorker {
    async fn handle(&self, payload: JobPayload, _ctx: JobContext) -> Outcome<()> {
        if self.autoindexing_disabled {
            return Ok(());
        }

        self.refresh_embedding_config(!matches!(payload, JobPayload::Delete { .. } | JobPayload::Purge { .. })).await;

        match payload {
            JobPayload::Index { entity_type: entity_id, record_id, tenant_id, organization_id } => {
                let scope = hybrid_search_core::model::TenantScope::new(tenant_id, organization_id);
                match self.indexer.index_record_by_id(&entity_id, &record_id, scope).await {
                    Ok(IndexOutcome::Indexed) => {
                        self.apply_coverage_delta(entity_id.as_str(), &tenant_id.to_string(), 1).await;
                        Ok(())
                    }
                    Ok(IndexOutcome::Skipped { reason }) => {
                        tracing::debug!(reason, "index job skipped");
                        Ok(())
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "index job failed");
                        Err(err)
                    }
                }
            }
            JobPayload::Delete { entity_type: entity_id, record_id, tenant_id } => match self.indexer.delete_record(&entity_id, &record_id, &tenant_id).await {
                Ok(()) => {
                    self.apply_coverage_delta(entity_id.as_str(), &tenant_id.to_string(), -1).await;
                    Ok(())
                }
                Err(err) if err.is_index_not_found() => Ok(()),
                Err(err) => Err(err),
            },
            JobPayload::Purge { entity_type: entity_id, tenant_id } => match self.indexer.purge_entity(&entity_id, &tenant_id).await {
                Ok(()) => Ok(()),
                Err(err) if err.is_index_not_found() => Ok(()),
                Err(err) => Err(err),
            },
            JobPayload::BatchIndex { tenant_id, organization_id, records } => {
                let scope = hybrid_search_core::model::TenantScope::new(tenant_id, organization_id);
                let mut succeeded = 0usize;
                let mut failed = 0usize;
                for record in records {
                    match self.indexer.index_record_by_id(&record.entity_id, &record.record_id, scope.clone()).await {
                        Ok(_) => succeeded += 1,
                        Err(err) => {
                            tracing::warn!(error = %err, "batch-index record failed, continuing with remaining records");
                            failed += 1;
                        }
                    }
                }
                if succeeded > 0 {
                    if let Some(heartbeat) = &self.heartbeat {
                        heartbeat();
                    }
                }
                tracing::info!(succeeded, failed, "batch-index job processed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn in_memory_coverage_adjuster_tracks_net_delta() {
        let adjuster = InMemoryCoverageAdjuster::default();
        adjuster.adjust("crm:contact", "tenant", 1);
        adjuster.adjust("crm:contact", "tenant", 1);
        adjuster.adjust("crm:contact", "tenant", -1);
        assert_eq!(adjuster.total(), 1);
    }

    struct AlwaysMissingCoverageAdjuster;
    impl CoverageAdjuster for AlwaysMissingCoverageAdjuster {
        fn adjust(&self, _entity_id: &str, _tenant_id: &str, _delta: i64) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingCoverageRefreshPublisher {
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CoverageRefreshPublisher for RecordingCoverageRefreshPublisher {
        async fn publish_coverage_refresh(&self, entity_id: &str, tenant_id: &str) -> Outcome<()> {
            self.published.lock().unwrap().push((entity_id.to_string(), tenant_id.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn apply_coverage_delta_emits_a_refresh_event_when_it_cannot_be_applied_locally() {
        use hybrid_search_core::identity::{EntityId, EntityIdType, TenantId};
        use hybrid_search_index::entity_config::EntityConfigRegistry;
        use hybrid_search_index::orchestrator::{OrchestratorHandle, SearchOrchestrator};

        let registry = Arc::new(EntityConfigRegistry::new());
        let orchestrator: Arc<dyn OrchestratorHandle> = Arc::new(SearchOrchestrator::new(Vec::new(), None, None, Default::default()));
        let indexer = Arc::new(Indexer::new(registry, Arc::new(hybrid_search_test_utils::FakePrimaryStore::new()), orchestrator, Arc::new(|_: &EntityId| Vec::new())));

        let publisher = Arc::new(RecordingCoverageRefreshPublisher::default());
        let worker = IndexingWorker::new(indexer, Arc::new(AlwaysMissingCoverageAdjuster), false).with_coverage_refresh_publisher(publisher.clone());

        worker.apply_coverage_delta("crm:contact", &TenantId::now_v7().to_string(), 1).await;
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }
}
