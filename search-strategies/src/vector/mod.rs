//! Semantic ANN search over a single vector driver, fronted by a pluggable
//! [`EmbeddingProvider`].

use crate::embedding::EmbeddingProvider;
use crate::single_flight::SingleFlight;
use crate::strategy::{Strategy, StrategyQuery};
use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, OrganizationId, RecordId, TenantId};
use hybrid_search_core::model::{IndexableRecord, Link, Presenter, SearchResult as Hit, TenantScope};
use hybrid_search_core::SearchResult as Outcome;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Filter applied by the vector driver. `organization_id: None` means "no
/// org filter" for full-text, but the vector strategy treats it as strict
/// equality: a query without an organization scope only matches rows whose
/// stored `organization_id` is also `None`.
#[derive(Debug, Clone)]
pub struct VectorFilter {
    pub tenant_id: TenantId,
    pub organization_id: Option<OrganizationId>,
    pub entity_ids: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: VectorFilter,
}

/// A row as returned by the vector driver. `score` is cosine similarity in
/// `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub score: f32,
    pub presenter: Option<Presenter>,
    pub url: Option<String>,
    pub links: Vec<Link>,
    pub primary_link_href: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VectorDocument {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub scope: TenantScope,
    pub vector: Vec<f32>,
    pub checksum: String,
    pub presenter: Option<Presenter>,
    pub url: Option<String>,
    pub links: Vec<Link>,
}

#[async_trait]
pub trait VectorDriver: Send + Sync {
    async fn ensure_ready(&self) -> Outcome<()>;
    async fn query(&self, query: &VectorQuery) -> Outcome<Vec<VectorHit>>;
    async fn upsert(&self, document: VectorDocument) -> Outcome<()>;
    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()>;
    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()>;
}

/// Derives the text fed to the embedding provider: the record's explicit
/// `text` fragments when the entity hook supplied any, else presenter
/// title/subtitle plus every string-valued field.
fn derive_embedding_text(record: &IndexableRecord) -> String {
    if !record.text.is_empty() {
        return record.text.join("\n");
    }
    let mut parts = Vec::new();
    if let Some(presenter) = &record.presenter {
        parts.extend(presenter.title.clone());
        parts.extend(presenter.subtitle.clone());
    }
    for value in record.searchable_fields.values() {
        if let Value::String(s) = value {
            parts.push(s.clone());
        }
    }
    parts.join("\n")
}

/// 16-hex-char SHA-256 prefix over the record's checksum source, used by
/// upstream callers to skip re-embedding unchanged records.
pub fn compute_checksum(record: &IndexableRecord) -> String {
    let source = record.checksum_source.clone().unwrap_or_else(|| {
        serde_json::json!({
            "fields": record.fields,
            "presenter": record.presenter,
            "url": record.url,
        })
    });
    let bytes = serde_json::to_vec(&source).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())[..16].to_string()
}

pub struct VectorStrategy {
    driver: Arc<dyn VectorDriver>,
    embeddings: Arc<dyn EmbeddingProvider>,
    init: SingleFlight,
}

impl VectorStrategy {
    pub fn new(driver: Arc<dyn VectorDriver>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { driver, embeddings, init: SingleFlight::new() }
    }
}

#[async_trait]
impl Strategy for VectorStrategy {
    fn id(&self) -> &'static str {
        "vector"
    }

    fn name(&self) -> &'static str {
        "Vector semantic search"
    }

    fn priority(&self) -> i32 {
        2
    }

    async fn is_available(&self) -> bool {
        self.embeddings.is_available()
    }

    async fn ensure_ready(&self) -> Outcome<()> {
        let driver = self.driver.clone();
        self.init.run_once("vector-driver", || async move { driver.ensure_ready().await }).await
    }

    async fn search(&self, query: &StrategyQuery) -> Outcome<Vec<Hit>> {
        let vector = self.embeddings.embed(&query.text).await?;
        let hits = self
            .driver
            .query(&VectorQuery {
                vector,
                limit: query.limit,
                filter: VectorFilter {
                    tenant_id: query.scope.tenant_id,
                    organization_id: query.scope.organization_id,
                    entity_ids: query.entity_ids.clone(),
                },
            })
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| Hit {
                entity_id: hit.entity_id,
                record_id: hit.record_id,
                score: hit.score as f64,
                source: self.id().to_string(),
                presenter: hit.presenter,
                url: hit.primary_link_href.or(hit.url),
                links: hit.links,
                metadata: BTreeMap::new(),
            })
            .collect())
    }

    async fn index(&self, record: &IndexableRecord) -> Outcome<()> {
        let text = derive_embedding_text(record);
        let vector = self.embeddings.embed(&text).await?;
        let checksum = compute_checksum(record);
        self.driver
            .upsert(VectorDocument {
                entity_id: record.entity_id.clone(),
                record_id: record.record_id.clone(),
                scope: record.scope.clone(),
                vector,
                checksum,
                presenter: record.presenter.clone(),
                url: record.url.clone(),
                links: record.links.clone(),
            })
            .await
    }

    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()> {
        self.driver.delete(entity_id, record_id, tenant_id).await
    }

    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()> {
        self.driver.purge(entity_id, tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::identity::EntityIdType;

    #[test]
    fn checksum_is_a_sixteen_character_hex_prefix() {
        let record = IndexableRecord::new(EntityId::new("crm:contact"), RecordId::new("1"), TenantScope::tenant_only(TenantId::now_v7()));
        let checksum = compute_checksum(&record);
        assert_eq!(checksum.len(), 16);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn checksum_changes_when_fields_change() {
        let scope = TenantScope::tenant_only(TenantId::now_v7());
        let mut a = IndexableRecord::new(EntityId::new("crm:contact"), RecordId::new("1"), scope.clone());
        a.fields.insert("name".to_string(), serde_json::json!("Ada"));
        let mut b = IndexableRecord::new(EntityId::new("crm:contact"), RecordId::new("1"), scope);
        b.fields.insert("name".to_string(), serde_json::json!("Grace"));
        assert_ne!(compute_checksum(&a), compute_checksum(&b));
    }

    #[test]
    fn derive_embedding_text_prefers_explicit_text_fragments() {
        let mut record = IndexableRecord::new(EntityId::new("crm:contact"), RecordId::new("1"), TenantScope::tenant_only(TenantId::now_v7()));
        record.text.push("explicit text".to_string());
        record.fields.insert("ignored".to_string(), serde_json::json!("not used"));
        assert_eq!(derive_embedding_text(&record), "explicit text");
    }
}
