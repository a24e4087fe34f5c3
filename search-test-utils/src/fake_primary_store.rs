//! An in-memory primary store: rows keyed by `(entity_id, scope, record_id)`,
//! plus a parallel `entity_indexes`-shaped table for enrichment lookups.

use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, RecordId, TenantId};
use hybrid_search_core::model::TenantScope;
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_index::primary_store::{EntityIndexRow, PageRequest, PrimaryStore, RowPage};
use hybrid_search_index::row::Row;
use hybrid_search_queue::events::TenantResolver;
use std::collections::BTreeMap;
use std::sync::RwLock;

type Key = (String, String, String);

#[derive(Default)]
pub struct FakePrimaryStore {
    rows: RwLock<BTreeMap<Key, Row>>,
    docs: RwLock<BTreeMap<Key, serde_json::Value>>,
}

impl FakePrimaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(entity_id: &EntityId, scope: &TenantScope, record_id: &str) -> Key {
        (scope.tenant_id.to_string(), entity_id.to_string(), record_id.to_string())
    }

    pub fn insert_row(&self, entity_id: &EntityId, scope: &TenantScope, row: Row) {
        self.rows.write().unwrap().insert(Self::key(entity_id, scope, &row.id), row);
    }

    pub fn insert_entity_index_doc(&self, entity_id: &EntityId, scope: &TenantScope, record_id: &str, doc: serde_json::Value) {
        self.docs.write().unwrap().insert(Self::key(entity_id, scope, record_id), doc);
    }
}

#[async_trait]
impl PrimaryStore for FakePrimaryStore {
    async fn query_page(&self, entity_id: &EntityId, scope: &TenantScope, page: PageRequest, _include_custom_fields: bool) -> Outcome<RowPage> {
        let tenant = scope.tenant_id.to_string();
        let entity = entity_id.to_string();
        let rows = self.rows.read().unwrap();
        let mut matching: Vec<Row> = rows.iter().filter(|((t, e, _), _)| t == &tenant && e == &entity).map(|(_, row)| row.clone()).collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let total = matching.len();
        let start = page.page * page.page_size;
        let items = if start >= total { Vec::new() } else { matching[start..(start + page.page_size).min(total)].to_vec() };
        Ok(RowPage { items, total })
    }

    async fn load_row(&self, entity_id: &EntityId, record_id: &RecordId, scope: &TenantScope) -> Outcome<Option<Row>> {
        Ok(self.rows.read().unwrap().get(&Self::key(entity_id, scope, record_id.as_str())).cloned())
    }

    async fn fetch_entity_index_rows(&self, requests: &[(EntityId, Vec<RecordId>)], scope: &TenantScope) -> Outcome<Vec<EntityIndexRow>> {
        let docs = self.docs.read().unwrap();
        let mut out = Vec::new();
        for (entity_id, record_ids) in requests {
            for record_id in record_ids {
                let key = Self::key(entity_id, scope, record_id.as_str());
                if let Some(doc) = docs.get(&key) {
                    out.push(EntityIndexRow { entity_id: entity_id.clone(), record_id: record_id.clone(), scope: scope.clone(), doc: doc.clone(), deleted_at: None });
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl TenantResolver for FakePrimaryStore {
    async fn resolve_tenant(&self, entity_id: &EntityId, record_id: &RecordId) -> Outcome<Option<TenantId>> {
        let entity = entity_id.to_string();
        let record = record_id.to_string();
        let rows = self.rows.read().unwrap();
        Ok(rows.keys().find(|(_, e, r)| e == &entity && r == &record).map(|(t, _, _)| t.parse().expect("fake store stores valid tenant uuids")))
    }
}
