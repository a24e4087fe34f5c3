//! Builds indexable records from raw primary-store rows via per-entity
//! hooks, and forwards them to the orchestrator.

use crate::entity_config::{EntityConfigEntry, EntityConfigRegistry};
use crate::orchestrator::OrchestratorHandle;
use crate::primary_store::{PageRequest, PrimaryStore};
use crate::row::{normalize_custom_fields, Row};
use hybrid_search_core::field_policy::{extract_hash_only_fields, extract_searchable_fields};
use hybrid_search_core::identity::{EntityId, RecordId};
use hybrid_search_core::model::{EncryptionMapEntry, IndexableRecord, TenantScope};
use hybrid_search_core::SearchResult as Outcome;
use std::collections::BTreeMap;
use std::sync::Arc;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed,
    Skipped { reason: String },
}

pub struct Indexer {
    registry: Arc<EntityConfigRegistry>,
    primary_store: Arc<dyn PrimaryStore>,
    orchestrator: Arc<dyn OrchestratorHandle>,
    encrypted_fields: Arc<dyn Fn(&EntityId) -> Vec<EncryptionMapEntry> + Send + Sync>,
}

impl Indexer {
    pub fn new(
        registry: Arc<EntityConfigRegistry>,
        primary_store: Arc<dyn PrimaryStore>,
        orchestrator: Arc<dyn OrchestratorHandle>,
        encrypted_fields: Arc<dyn Fn(&EntityId) -> Vec<EncryptionMapEntry> + Send + Sync>,
    ) -> Self {
        Self { registry, primary_store, orchestrator, encrypted_fields }
    }

    /// Builds an indexable record straight from an already-fetched row and
    /// forwards it to the orchestrator.
    pub async fn index_record(&self, entity_id: &EntityId, row: &Row, scope: TenantScope) -> Outcome<IndexOutcome> {
        if row.id.is_empty() {
            return Ok(IndexOutcome::Skipped { reason: "empty record id".to_string() });
        }
        let Some(entry) = self.registry.get(entity_id) else {
            return Ok(IndexOutcome::Skipped { reason: "entity not registered".to_string() });
        };
        if !entry.config.enabled {
            return Ok(IndexOutcome::Skipped { reason: "entity disabled".to_string() });
        }

        let built_fields = normalize_custom_fields(entry.hooks.build_source(row));
        let mut record = IndexableRecord::new(entity_id.clone(), RecordId::new(row.id.clone()), scope);
        record.presenter = entry.hooks.format_result(row);
        record.url = entry.hooks.resolve_url(row);
        record.links = entry.hooks.resolve_links(row);
        self.project_fields(entity_id, entry, built_fields, &mut record);

        self.orchestrator.index(&record).await?;
        Ok(IndexOutcome::Indexed)
    }

    /// Populates `record.fields`/`searchable_fields`/`hash_only_fields` from
    /// `built_fields` per this entity's field policy, so each strategy only
    /// ever receives the projection it is allowed to see.
    fn project_fields(&self, entity_id: &EntityId, entry: &EntityConfigEntry, built_fields: BTreeMap<String, Value>, record: &mut IndexableRecord) {
        let encrypted = (self.encrypted_fields)(entity_id);
        record.searchable_fields = extract_searchable_fields(&built_fields, &encrypted, &entry.config.field_policy);
        record.hash_only_fields = extract_hash_only_fields(&built_fields, &encrypted, &entry.config.field_policy);
        record.fields = built_fields;
    }

    /// Loads the row by id from the primary store, then delegates to
    /// [`Indexer::index_record`].
    pub async fn index_record_by_id(&self, entity_id: &EntityId, record_id: &RecordId, scope: TenantScope) -> Outcome<IndexOutcome> {
        let row = self.primary_store.load_row(entity_id, record_id, &scope).await?;
        match row {
            Some(row) => self.index_record(entity_id, &row, scope).await,
            None => Ok(IndexOutcome::Skipped { reason: "row not found".to_string() }),
        }
    }

    pub async fn delete_record(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &hybrid_search_core::identity::TenantId) -> Outcome<()> {
        self.orchestrator.delete(entity_id, record_id, tenant_id).await
    }

    pub async fn purge_entity(&self, entity_id: &EntityId, tenant_id: &hybrid_search_core::identity::TenantId) -> Outcome<()> {
        self.orchestrator.purge(entity_id, tenant_id).await
    }

    /// Bulk-builds indexable records for a page of rows, dropping any row
    /// with an empty id and counting it separately.
    pub async fn bulk_index_rows(&self, entity_id: &EntityId, rows: &[Row], scope: TenantScope) -> Outcome<BulkIndexReport> {
        let Some(entry) = self.registry.get(entity_id) else {
            return Ok(BulkIndexReport { indexed: 0, dropped: rows.len() });
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut dropped = 0;
        for row in rows {
            if row.id.is_empty() {
                dropped += 1;
                continue;
            }
            let fields = normalize_custom_fields(entry.hooks.build_source(row));
            let mut record = IndexableRecord::new(entity_id.clone(), RecordId::new(row.id.clone()), scope.clone());
            record.presenter = entry.hooks.format_result(row);
            record.url = entry.hooks.resolve_url(row);
            record.links = entry.hooks.resolve_links(row);
            self.project_fields(entity_id, entry, fields, &mut record);
            records.push(record);
        }

        let indexed = records.len();
        if !records.is_empty() {
            self.orchestrator.bulk_index(&records).await?;
        }
        Ok(BulkIndexReport { indexed, dropped })
    }

    /// Paginated scan over an entity's rows, used by the reindex
    /// controller.
    pub async fn fetch_page(&self, entity_id: &EntityId, scope: &TenantScope, page: PageRequest) -> Outcome<Vec<Row>> {
        let result = self.primary_store.query_page(entity_id, scope, page, true).await?;
        Ok(result.items)
    }

    /// Recreates the named strategy's per-tenant index, e.g. at the start of
    /// a reindex with `recreateIndex` set.
    pub async fn recreate_index(&self, strategy_id: &str, tenant_id: &hybrid_search_core::identity::TenantId) -> Outcome<()> {
        self.orchestrator.recreate_index(strategy_id, tenant_id).await
    }

    /// Every enabled entity id registered for search, used by a full
    /// `reindexAll` sweep.
    pub fn enabled_entity_ids(&self) -> Vec<EntityId> {
        self.registry.enabled_entities().map(|entry| entry.config.entity_id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkIndexReport {
    pub indexed: usize,
    pub dropped: usize,
}
