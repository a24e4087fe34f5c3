//! Fills in missing or redacted presenter fragments by batch-loading the
//! primary store's `entity_indexes` table and running per-entity hooks.

use crate::encryption::{DataEncryptionKey, EncryptionService};
use crate::entity_config::EntityConfigRegistry;
use crate::primary_store::{fallback_presenter, PrimaryStore};
use crate::row::Row;
use futures::future::join_all;
use hybrid_search_core::identity::{EntityId, OrganizationId, RecordId};
use hybrid_search_core::model::{Link, Presenter, SearchResult as Hit, TenantScope};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct PresenterEnricher {
    primary_store: Arc<dyn PrimaryStore>,
    encryption: Arc<dyn EncryptionService>,
    registry: Arc<EntityConfigRegistry>,
    chunk_size: usize,
}

impl PresenterEnricher {
    pub fn new(primary_store: Arc<dyn PrimaryStore>, encryption: Arc<dyn EncryptionService>, registry: Arc<EntityConfigRegistry>, chunk_size: usize) -> Self {
        Self { primary_store, encryption, registry, chunk_size }
    }

    /// Enriches every result that needs it in place; results untouched are
    /// passed through unchanged. Enrichment failures for individual results
    /// are logged and leave that result's presenter as-is (non-fatal).
    pub async fn enrich(&self, mut results: Vec<Hit>, scope: &TenantScope) -> Vec<Hit> {
        let needs_enrichment: Vec<usize> = results.iter().enumerate().filter(|(_, r)| r.needs_enrichment()).map(|(i, _)| i).collect();
        if needs_enrichment.is_empty() {
            return results;
        }

        let mut by_entity: BTreeMap<EntityId, Vec<RecordId>> = BTreeMap::new();
        for idx in &needs_enrichment {
            let result = &results[*idx];
            by_entity.entry(result.entity_id.clone()).or_default().push(result.record_id.clone());
        }

        let requests: Vec<(EntityId, Vec<RecordId>)> = by_entity.into_iter().collect();
        let mut rows_by_key: BTreeMap<(EntityId, RecordId), Row> = BTreeMap::new();

        for chunk in chunk_requests(&requests, self.chunk_size) {
            match self.primary_store.fetch_entity_index_rows(&chunk, scope).await {
                Ok(rows) => {
                    let mut dek_cache: BTreeMap<Option<OrganizationId>, DataEncryptionKey> = BTreeMap::new();
                    for row in rows {
                        if row.deleted_at.is_some() {
                            continue;
                        }
                        let org = row.scope.organization_id;
                        let dek = match dek_cache.get(&org) {
                            Some(key) => key.clone(),
                            None => match self.encryption.data_encryption_key(&row.scope).await {
                                Ok(key) => {
                                    dek_cache.insert(org, key.clone());
                                    key
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, "failed to fetch data encryption key during enrichment");
                                    continue;
                                }
                            },
                        };
                        let decrypted = self.encryption.decrypt_document(&row.doc, &dek);
                        let fields = decrypted.as_object().cloned().unwrap_or_default();
                        let record_id = row.record_id.to_string();
                        rows_by_key.insert((row.entity_id, row.record_id), Row { id: record_id, fields: fields.into_iter().collect() });
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to batch-load entity_indexes rows for enrichment");
                }
            }
        }

        let enrichments = join_all(needs_enrichment.iter().map(|idx| {
            let result = &results[*idx];
            let entity_id = result.entity_id.clone();
            let key = (entity_id.clone(), result.record_id.clone());
            let row = rows_by_key.get(&key).cloned();
            let entry = self.registry.get(&entity_id);
            let idx = *idx;
            async move { (idx, self.build_enrichment(entry, row, &entity_id)) }
        }))
        .await;

        for (idx, enrichment) in enrichments {
            if let Some((presenter, url, links)) = enrichment {
                let result = &mut results[idx];
                if result.presenter.as_ref().map(|p| p.title.is_some() && !p.looks_encrypted()).unwrap_or(false) {
                    // Original title wins: only backfill the missing pieces.
                    if result.url.is_none() && result.links.is_empty() {
                        result.url = result.url.take().or(url);
                        if result.links.is_empty() {
                            result.links = links;
                        }
                    }
                } else {
                    result.presenter = Some(presenter);
                    if result.url.is_none() {
                        result.url = url;
                    }
                    if result.links.is_empty() {
                        result.links = links;
                    }
                }
            }
        }

        results
    }

    fn build_enrichment(&self, entry: Option<&crate::entity_config::EntityConfigEntry>, row: Option<Row>, entity_id: &EntityId) -> Option<(Presenter, Option<String>, Vec<Link>)> {
        let row = row?;
        let hook_presenter = entry.and_then(|e| e.hooks.format_result(&row));
        let url = entry.and_then(|e| e.hooks.resolve_url(&row));
        let links = entry.map(|e| e.hooks.resolve_links(&row)).unwrap_or_default();
        let presenter = hook_presenter.unwrap_or_else(|| {
            let source = entry.map(|e| e.hooks.build_source(&row)).unwrap_or_else(|| row.fields.clone());
            let object: serde_json::Map<String, serde_json::Value> = source.into_iter().collect();
            fallback_presenter(entity_id.as_str(), &row.id, &object)
        });
        Some((presenter, url, links))
    }
}

fn chunk_requests(requests: &[(EntityId, Vec<RecordId>)], chunk_size: usize) -> Vec<Vec<(EntityId, Vec<RecordId>)>> {
    // Chunking applies to the flattened (entity_id, record_id) pairs so a
    // single statement never carries more than `chunk_size` bound
    // parameters, even when one entity contributes many ids.
    let mut flattened: Vec<(EntityId, RecordId)> = Vec::new();
    for (entity_id, record_ids) in requests {
        for record_id in record_ids {
            flattened.push((entity_id.clone(), record_id.clone()));
        }
    }

    flattened
        .chunks(chunk_size.max(1))
        .map(|chunk| {
            let mut grouped: BTreeMap<EntityId, Vec<RecordId>> = BTreeMap::new();
            for (entity_id, record_id) in chunk {
                grouped.entry(entity_id.clone()).or_default().push(record_id.clone());
            }
            grouped.into_iter().collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_requests_respects_the_chunk_size() {
        let requests = vec![(EntityId::new("crm:contact"), (0..1200).map(|i| RecordId::new(i.to_string())).collect())];
        let chunks = chunk_requests(&requests, 500);
        assert_eq!(chunks.len(), 3);
        let total: usize = chunks.iter().map(|c| c.iter().map(|(_, ids)| ids.len()).sum::<usize>()).sum();
        assert_eq!(total, 1200);
    }
}
