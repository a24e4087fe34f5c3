//! Fans out search/index/delete/bulk-index/purge calls across every
//! registered strategy, merges search results via RRF, and invokes the
//! presenter enricher. Strategy failures are isolated: one strategy's
//! failure never aborts the others (settle-all semantics).

use crate::enricher::PresenterEnricher;
use async_trait::async_trait;
use futures::future::join_all;
use hybrid_search_core::config::RrfConfig;
use hybrid_search_core::identity::{EntityId, RecordId, TenantId};
use hybrid_search_core::merge::{fuse_rrf, SourceResults};
use hybrid_search_core::model::{IndexableRecord, SearchResult as Hit, TenantScope};
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_strategies::{Strategy, StrategyQuery};
use std::sync::Arc;

/// Query-time options layered on top of [`StrategyQuery`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub strategies: Option<Vec<String>>,
    pub entity_ids: Option<Vec<EntityId>>,
    pub limit: Option<usize>,
}

const DEFAULT_LIMIT: usize = 20;

/// Narrow handle the indexer depends on, so it never needs the concrete
/// orchestrator type (breaking the indexer <-> orchestrator cycle).
#[async_trait]
pub trait OrchestratorHandle: Send + Sync {
    async fn index(&self, record: &IndexableRecord) -> Outcome<()>;
    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()>;
    async fn bulk_index(&self, records: &[IndexableRecord]) -> Outcome<()>;
    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()>;
    /// Recreates the named strategy's index for one tenant, e.g. at the
    /// start of a reindex with `recreateIndex` set. A no-op when no
    /// registered strategy matches `strategy_id`.
    async fn recreate_index(&self, strategy_id: &str, tenant_id: &TenantId) -> Outcome<()>;
}

pub struct SearchOrchestrator {
    strategies: Vec<Arc<dyn Strategy>>,
    /// Strategy id to fall back to when every preferred strategy is
    /// unavailable.
    fallback_strategy: Option<String>,
    enricher: Option<Arc<PresenterEnricher>>,
    rrf: RrfConfig,
}

impl SearchOrchestrator {
    /// Registered strategies are consulted in priority order
    /// (`fulltext > vector > tokens` by default, driven by each strategy's
    /// `priority()`); this constructor does not re-sort the caller's list
    /// beyond what §4.8 requires for merge tie-breaking.
    pub fn new(strategies: Vec<Arc<dyn Strategy>>, fallback_strategy: Option<String>, enricher: Option<Arc<PresenterEnricher>>, rrf: RrfConfig) -> Self {
        Self { strategies, fallback_strategy, enricher, rrf }
    }

    fn resolve_active(&self, requested: &Option<Vec<String>>) -> Vec<Arc<dyn Strategy>> {
        match requested {
            Some(ids) => self.strategies.iter().filter(|s| ids.iter().any(|id| id == s.id())).cloned().collect(),
            None => self.strategies.clone(),
        }
    }

    pub async fn search(&self, text: &str, scope: TenantScope, options: SearchOptions) -> Vec<Hit> {
        let candidates = self.resolve_active(&options.strategies);
        let mut available = Vec::new();
        for strategy in &candidates {
            if strategy.is_available().await {
                available.push(strategy.clone());
            }
        }

        if available.is_empty() {
            if let Some(fallback_id) = &self.fallback_strategy {
                if let Some(strategy) = self.strategies.iter().find(|s| s.id() == fallback_id) {
                    if strategy.is_available().await {
                        available.push(strategy.clone());
                    }
                }
            }
        }

        if available.is_empty() {
            return Vec::new();
        }

        let query = StrategyQuery { text: text.to_string(), scope: scope.clone(), entity_ids: options.entity_ids.clone(), limit: options.limit.unwrap_or(DEFAULT_LIMIT) };

        let mut sources = Vec::new();
        for result in join_all(available.iter().map(|strategy| run_strategy_search(strategy.clone(), query.clone()))).await {
            if let Some(source) = result {
                sources.push(source);
            }
        }

        let merged = fuse_rrf(sources, &self.rrf);

        match &self.enricher {
            Some(enricher) => enricher.enrich(merged, &scope).await,
            None => merged,
        }
    }
}

async fn run_strategy_search(strategy: Arc<dyn Strategy>, query: StrategyQuery) -> Option<SourceResults> {
    if let Err(err) = strategy.ensure_ready().await {
        tracing::warn!(strategy = strategy.id(), error = %err, "strategy ensure_ready failed, continuing with remaining strategies");
        return None;
    }
    match strategy.search(&query).await {
        Ok(results) => Some(SourceResults::new(strategy.id(), results)),
        Err(err) => {
            tracing::warn!(strategy = strategy.id(), error = %err, "strategy search failed, continuing with remaining strategies");
            None
        }
    }
}

#[async_trait]
impl OrchestratorHandle for SearchOrchestrator {
    async fn index(&self, record: &IndexableRecord) -> Outcome<()> {
        let results = join_all(self.strategies.iter().map(|strategy| {
            let strategy = strategy.clone();
            let record = record.clone();
            async move { (strategy.id(), strategy.index(&record).await) }
        }))
        .await;
        log_settled_failures("index", &results);
        Ok(())
    }

    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()> {
        let results = join_all(self.strategies.iter().map(|strategy| {
            let strategy = strategy.clone();
            let entity_id = entity_id.clone();
            let record_id = record_id.clone();
            let tenant_id = *tenant_id;
            async move { (strategy.id(), strategy.delete(&entity_id, &record_id, &tenant_id).await) }
        }))
        .await;
        log_settled_failures("delete", &results);
        Ok(())
    }

    async fn bulk_index(&self, records: &[IndexableRecord]) -> Outcome<()> {
        let results = join_all(self.strategies.iter().map(|strategy| {
            let strategy = strategy.clone();
            let records = records.to_vec();
            async move { (strategy.id(), strategy.bulk_index(&records).await) }
        }))
        .await;
        log_settled_failures("bulk_index", &results);
        Ok(())
    }

    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()> {
        let results = join_all(self.strategies.iter().map(|strategy| {
            let strategy = strategy.clone();
            let entity_id = entity_id.clone();
            let tenant_id = *tenant_id;
            async move { (strategy.id(), strategy.purge(&entity_id, &tenant_id).await) }
        }))
        .await;
        log_settled_failures("purge", &results);
        Ok(())
    }

    async fn recreate_index(&self, strategy_id: &str, tenant_id: &TenantId) -> Outcome<()> {
        match self.strategies.iter().find(|s| s.id() == strategy_id) {
            Some(strategy) => strategy.recreate_index(tenant_id).await,
            None => Ok(()),
        }
    }
}

fn log_settled_failures(op: &str, results: &[(&'static str, Outcome<()>)]) {
    for (strategy_id, result) in results {
        if let Err(err) = result {
            tracing::warn!(strategy = *strategy_id, operation = op, error = %err, "strategy write failed, other strategies were not affected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::identity::{EntityId, EntityIdType, RecordId};
    use hybrid_search_strategies::token::{InMemoryTokenStore, TokenStrategy};

    fn scope() -> TenantScope {
        TenantScope::tenant_only(TenantId::now_v7())
    }

    #[tokio::test]
    async fn search_with_no_available_strategies_returns_empty() {
        let orchestrator = SearchOrchestrator::new(Vec::new(), None, None, RrfConfig::default());
        let hits = orchestrator.search("anything", scope(), SearchOptions::default()).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn index_then_search_round_trips_through_the_token_strategy() {
        let token_strategy: Arc<dyn Strategy> = Arc::new(TokenStrategy::new(InMemoryTokenStore::new()));
        let orchestrator = SearchOrchestrator::new(vec![token_strategy], None, None, RrfConfig::default());

        let scope = scope();
        let mut record = IndexableRecord::new(EntityId::new("crm:contact"), RecordId::new("1"), scope.clone());
        record.hash_only_fields.insert("ssn".to_string(), serde_json::json!("999-00-1111"));
        orchestrator.index(&record).await.unwrap();

        let hits = orchestrator.search("999-00-1111", scope, SearchOptions::default()).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record_id, RecordId::new("1"));
    }
}
