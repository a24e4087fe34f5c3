//! The capability contract every retrieval backend implements.

use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, RecordId, TenantId};
use hybrid_search_core::model::{IndexableRecord, SearchResult, TenantScope};
use hybrid_search_core::SearchResult as Outcome;

/// Query parameters common to every strategy.
#[derive(Debug, Clone)]
pub struct StrategyQuery {
    pub text: String,
    pub scope: TenantScope,
    pub entity_ids: Option<Vec<EntityId>>,
    pub limit: usize,
}

/// Every retrieval backend implements this contract. `id`/`name`/`priority`
/// are static; `is_available` must be cheap and side-effect-free since the
/// orchestrator may call it once per query.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    /// Higher priority strategies win tie-breaks during merge.
    fn priority(&self) -> i32;

    async fn is_available(&self) -> bool;

    /// Idempotent setup (schema/index creation). Concurrent callers for the
    /// same underlying resource must observe a single execution; see the
    /// single-flight helper in [`crate::single_flight`].
    async fn ensure_ready(&self) -> Outcome<()>;

    /// Results are already sorted by this strategy's internal score
    /// descending; callers treat list order as rank.
    async fn search(&self, query: &StrategyQuery) -> Outcome<Vec<SearchResult>>;

    async fn index(&self, record: &IndexableRecord) -> Outcome<()>;

    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()>;

    /// Default falls back to per-record `index`; strategies with a native
    /// bulk path should override this.
    async fn bulk_index(&self, records: &[IndexableRecord]) -> Outcome<()> {
        for record in records {
            self.index(record).await?;
        }
        Ok(())
    }

    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()>;

    /// Drops and recreates this strategy's per-tenant index from scratch.
    /// Default is a no-op; strategies backed by a physical index override
    /// this to call their driver's `recreateIndex`.
    async fn recreate_index(&self, _tenant_id: &TenantId) -> Outcome<()> {
        Ok(())
    }
}
