//! An in-memory vector driver: brute-force cosine similarity over whatever
//! has been upserted, filtered by tenant/organization/entity.

use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, RecordId, TenantId};
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_strategies::embedding::cosine_similarity;
use hybrid_search_strategies::vector::{VectorDocument, VectorDriver, VectorHit, VectorQuery};
use std::collections::BTreeMap;
use std::sync::RwLock;

type Key = (String, String, String);

#[derive(Default)]
pub struct FakeVectorDriver {
    documents: RwLock<BTreeMap<Key, VectorDocument>>,
}

impl FakeVectorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Key {
        (tenant_id.to_string(), entity_id.to_string(), record_id.to_string())
    }
}

#[async_trait]
impl VectorDriver for FakeVectorDriver {
    async fn ensure_ready(&self) -> Outcome<()> {
        Ok(())
    }

    async fn query(&self, query: &VectorQuery) -> Outcome<Vec<VectorHit>> {
        let tenant = query.filter.tenant_id.to_string();
        let documents = self.documents.read().unwrap();
        let mut hits: Vec<VectorHit> = documents
            .iter()
            .filter(|((t, _, _), _)| t == &tenant)
            .filter(|(_, doc)| doc.scope.organization_id == query.filter.organization_id)
            .filter(|(_, doc)| match &query.filter.entity_ids {
                Some(ids) => ids.contains(&doc.entity_id),
                None => true,
            })
            .map(|(_, doc)| VectorHit {
                entity_id: doc.entity_id.clone(),
                record_id: doc.record_id.clone(),
                score: cosine_similarity(&query.vector, &doc.vector),
                presenter: doc.presenter.clone(),
                url: doc.url.clone(),
                links: doc.links.clone(),
                primary_link_href: doc.links.first().map(|link| link.href.clone()),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn upsert(&self, document: VectorDocument) -> Outcome<()> {
        let key = Self::key(&document.entity_id, &document.record_id, &document.scope.tenant_id);
        self.documents.write().unwrap().insert(key, document);
        Ok(())
    }

    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()> {
        self.documents.write().unwrap().remove(&Self::key(entity_id, record_id, tenant_id));
        Ok(())
    }

    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()> {
        let tenant = tenant_id.to_string();
        let entity = entity_id.to_string();
        self.documents.write().unwrap().retain(|(t, e, _), _| !(t == &tenant && e == &entity));
        Ok(())
    }
}
