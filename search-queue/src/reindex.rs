//! Paginated scan, batching, and queue-aware lock + heartbeat management
//! for bulk (re)indexing.

use crate::lock_store::{is_stale, LockStore};
use crate::queue::Queue;
use chrono::Utc;
use hybrid_search_core::config::ReindexConfig;
use hybrid_search_core::error::LockError;
use hybrid_search_core::identity::{EntityId, OrganizationId, TenantId};
use hybrid_search_core::model::{BatchIndexRecordRef, JobPayload, ReindexLock, ReindexLockType, TenantScope};
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_index::indexer::Indexer;
use hybrid_search_index::primary_store::PageRequest;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexPhase {
    Starting,
    Fetching,
    Indexing,
    Complete,
}

pub type ProgressCallback = Arc<dyn Fn(ReindexPhase, usize, Option<usize>) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ReindexReport {
    pub success: bool,
    pub entities_processed: usize,
    pub records_indexed: usize,
    pub records_dropped: usize,
    pub jobs_enqueued: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum ReindexMode {
    Direct,
    Queued,
}

pub struct ReindexController {
    indexer: Arc<Indexer>,
    locks: Arc<dyn LockStore>,
    config: ReindexConfig,
}

impl ReindexController {
    pub fn new(indexer: Arc<Indexer>, locks: Arc<dyn LockStore>, config: ReindexConfig) -> Self {
        Self { indexer, locks, config }
    }

    async fn acquire_lock(&self, tenant_id: &TenantId, organization_id: Option<OrganizationId>, lock_type: ReindexLockType, queue: Option<&dyn Queue>) -> Outcome<()> {
        let now = Utc::now();
        if let Some(existing) = self.locks.read(tenant_id, lock_type).await? {
            let queue_idle = match queue {
                Some(q) => q.job_counts().await?.is_idle(),
                None => true,
            };
            if is_stale(&existing, now, queue_idle, &self.config) {
                self.locks.clear(tenant_id, lock_type).await?;
            } else {
                return Err(LockError::Conflict { tenant_id: *tenant_id }.into());
            }
        }

        let acquired = self
            .locks
            .acquire(ReindexLock { lock_type, action: "reindex".to_string(), tenant_id: *tenant_id, organization_id, started_at: now, last_heartbeat_at: now })
            .await?;

        if acquired {
            Ok(())
        } else {
            Err(LockError::Conflict { tenant_id: *tenant_id }.into())
        }
    }

    /// Runs a reindex for one entity under one tenant. In `Direct` mode
    /// this blocks until complete and clears the lock itself; in `Queued`
    /// mode it enqueues `batch-index` jobs and returns immediately, leaving
    /// the lock for queue-idle stale detection to eventually clear. When
    /// `recreate_index` is set, the strategy's physical index is dropped
    /// and recreated once, before the first page is fetched.
    #[allow(clippy::too_many_arguments)]
    pub async fn reindex_entity(
        &self,
        entity_id: &EntityId,
        scope: TenantScope,
        lock_type: ReindexLockType,
        mode: ReindexMode,
        recreate_index: bool,
        queue: Option<Arc<dyn Queue>>,
        progress: Option<ProgressCallback>,
    ) -> Outcome<ReindexReport> {
        self.reindex_entities(&[entity_id.clone()], scope, lock_type, mode, recreate_index, queue, progress).await
    }

    /// Runs a reindex across every entity id given, under a single lock
    /// acquisition for the `(tenant_id, lock_type)` pair. Used by a full
    /// `reindexAll` sweep so multiple entities don't each try to acquire
    /// the same lock in turn.
    pub async fn reindex_all(
        &self,
        entity_ids: &[EntityId],
        scope: TenantScope,
        lock_type: ReindexLockType,
        mode: ReindexMode,
        recreate_index: bool,
        queue: Option<Arc<dyn Queue>>,
        progress: Option<ProgressCallback>,
    ) -> Outcome<ReindexReport> {
        self.reindex_entities(entity_ids, scope, lock_type, mode, recreate_index, queue, progress).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn reindex_entities(
        &self,
        entity_ids: &[EntityId],
        scope: TenantScope,
        lock_type: ReindexLockType,
        mode: ReindexMode,
        recreate_index: bool,
        queue: Option<Arc<dyn Queue>>,
        progress: Option<ProgressCallback>,
    ) -> Outcome<ReindexReport> {
        self.acquire_lock(&scope.tenant_id, scope.organization_id, lock_type, queue.as_deref()).await?;
        if let Some(cb) = &progress {
            cb(ReindexPhase::Starting, 0, None);
        }

        if recreate_index {
            self.indexer.recreate_index(&lock_type.to_string(), &scope.tenant_id).await?;
        }

        let mut report = ReindexReport { success: true, ..Default::default() };

        for entity_id in entity_ids {
            let mut page_index = 0usize;

            loop {
                if page_index >= self.config.max_pages {
                    report.errors.push(format!("reached MAX_PAGES={} for entity {}", self.config.max_pages, entity_id));
                    break;
                }

                if let Some(cb) = &progress {
                    cb(ReindexPhase::Fetching, report.records_indexed, None);
                }

                let rows = match self.indexer.fetch_page(entity_id, &scope, PageRequest { page: page_index, page_size: self.config.direct_page_size }).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        report.success = false;
                        report.errors.push(err.to_string());
                        break;
                    }
                };

                if rows.is_empty() {
                    break;
                }

                if let Some(cb) = &progress {
                    cb(ReindexPhase::Indexing, report.records_indexed, None);
                }

                match mode {
                    ReindexMode::Direct => match self.indexer.bulk_index_rows(entity_id, &rows, scope.clone()).await {
                        Ok(batch_report) => {
                            report.records_indexed += batch_report.indexed;
                            report.records_dropped += batch_report.dropped;
                        }
                        Err(err) => {
                            report.errors.push(err.to_string());
                        }
                    },
                    ReindexMode::Queued => {
                        if let Some(queue) = &queue {
                            let records: Vec<BatchIndexRecordRef> = rows
                                .iter()
                                .filter(|row| !row.id.is_empty())
                                .map(|row| BatchIndexRecordRef { entity_id: entity_id.clone(), record_id: row.id.clone().into() })
                                .collect();
                            report.records_dropped += rows.len() - records.len();
                            if !records.is_empty() {
                                let count = records.len();
                                queue
                                    .enqueue(JobPayload::BatchIndex { tenant_id: scope.tenant_id, organization_id: scope.organization_id, records })
                                    .await?;
                                report.jobs_enqueued += 1;
                                report.records_indexed += count;
                            }
                        }
                    }
                }

                self.locks.heartbeat(&scope.tenant_id, lock_type, Utc::now()).await?;
                page_index += 1;
            }

            report.entities_processed += 1;
        }

        if let Some(cb) = &progress {
            cb(ReindexPhase::Complete, report.records_indexed, Some(report.records_indexed + report.records_dropped));
        }

        if matches!(mode, ReindexMode::Direct) {
            self.locks.clear(&scope.tenant_id, lock_type).await?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_pages_constant_matches_the_documented_cap() {
        assert_eq!(ReindexConfig::default().max_pages, 10_000);
    }
}
