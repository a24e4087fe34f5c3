//! Hash-based set-overlap search against a pre-populated token table, used
//! against fields the field-policy projector marks `hash_only`.

pub mod tokenizer;

use crate::strategy::{Strategy, StrategyQuery};
use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, RecordId, TenantId};
use hybrid_search_core::model::{IndexableRecord, SearchResult as Hit, TenantScope};
use hybrid_search_core::SearchResult as Outcome;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use tokenizer::tokenize_value;

/// Backing store for the token strategy, keyed by `(tenant_id, entity_id,
/// record_id)`. A production driver would persist this as a reverse index;
/// this trait only names the contract.
pub trait TokenStore: Send + Sync {
    fn replace_tokens(&self, scope: &TenantScope, entity_id: &EntityId, record_id: &RecordId, tokens: BTreeSet<String>);
    fn remove(&self, tenant_id: &TenantId, entity_id: &EntityId, record_id: &RecordId);
    fn remove_entity(&self, tenant_id: &TenantId, entity_id: &EntityId);
    fn matches(&self, tenant_id: &TenantId, entity_ids: Option<&[EntityId]>, query_hashes: &BTreeSet<String>) -> Vec<(EntityId, RecordId, usize)>;
}

type StoreKey = (String, String, String);

/// An in-memory [`TokenStore`] suitable as the default implementation and
/// for tests; real deployments may swap in a persistent driver behind the
/// same trait.
#[derive(Default)]
pub struct InMemoryTokenStore {
    rows: RwLock<BTreeMap<StoreKey, BTreeSet<String>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tenant_id: &TenantId, entity_id: &EntityId, record_id: &RecordId) -> StoreKey {
        (tenant_id.to_string(), entity_id.to_string(), record_id.to_string())
    }
}

impl TokenStore for InMemoryTokenStore {
    fn replace_tokens(&self, scope: &TenantScope, entity_id: &EntityId, record_id: &RecordId, tokens: BTreeSet<String>) {
        let mut rows = self.rows.write().unwrap();
        rows.insert(Self::key(&scope.tenant_id, entity_id, record_id), tokens);
    }

    fn remove(&self, tenant_id: &TenantId, entity_id: &EntityId, record_id: &RecordId) {
        self.rows.write().unwrap().remove(&Self::key(tenant_id, entity_id, record_id));
    }

    fn remove_entity(&self, tenant_id: &TenantId, entity_id: &EntityId) {
        let tenant = tenant_id.to_string();
        let entity = entity_id.to_string();
        self.rows.write().unwrap().retain(|(t, e, _), _| !(t == &tenant && e == &entity));
    }

    fn matches(&self, tenant_id: &TenantId, entity_ids: Option<&[EntityId]>, query_hashes: &BTreeSet<String>) -> Vec<(EntityId, RecordId, usize)> {
        let tenant = tenant_id.to_string();
        let rows = self.rows.read().unwrap();
        rows.iter()
            .filter(|((t, e, _), _)| {
                t == &tenant && entity_ids.map(|ids| ids.iter().any(|id| id.as_str() == e)).unwrap_or(true)
            })
            .filter_map(|((_, e, r), tokens)| {
                let matched = tokens.intersection(query_hashes).count();
                (matched > 0).then(|| (EntityId::new(e.clone()), RecordId::new(r.clone()), matched))
            })
            .collect()
    }
}

/// Minimum fraction of query tokens that must match for a record to be
/// returned.
const MIN_MATCH_RATIO: f64 = 0.0;

pub struct TokenStrategy<S: TokenStore> {
    store: S,
}

impl<S: TokenStore> TokenStrategy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Tokenizes and stores the hash-only projection of `fields` for a
    /// record, replacing whatever was previously indexed for that key.
    pub fn index_hash_only_fields(&self, scope: &TenantScope, entity_id: &EntityId, record_id: &RecordId, hash_only_fields: &BTreeMap<String, serde_json::Value>) {
        let mut tokens = BTreeSet::new();
        for value in hash_only_fields.values() {
            tokens.extend(tokenize_value(value));
        }
        self.store.replace_tokens(scope, entity_id, record_id, tokens);
    }
}

#[async_trait]
impl<S: TokenStore> Strategy for TokenStrategy<S> {
    fn id(&self) -> &'static str {
        "tokens"
    }

    fn name(&self) -> &'static str {
        "Token hash match"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn ensure_ready(&self) -> Outcome<()> {
        Ok(())
    }

    async fn search(&self, query: &StrategyQuery) -> Outcome<Vec<Hit>> {
        let query_hashes = tokenizer::tokenize_text(&query.text);
        if query_hashes.is_empty() {
            return Ok(Vec::new());
        }
        let min_matches = std::cmp::max(1, (query_hashes.len() as f64 * MIN_MATCH_RATIO).ceil() as usize);

        let mut matches = self.store.matches(&query.scope.tenant_id, query.entity_ids.as_deref(), &query_hashes);
        matches.retain(|(_, _, matched)| *matched >= min_matches);
        matches.sort_by(|a, b| b.2.cmp(&a.2));
        matches.truncate(query.limit);

        Ok(matches
            .into_iter()
            .map(|(entity_id, record_id, matched)| Hit {
                entity_id,
                record_id,
                score: matched as f64 / query_hashes.len() as f64,
                source: self.id().to_string(),
                presenter: None,
                url: None,
                links: Vec::new(),
                metadata: BTreeMap::new(),
            })
            .collect())
    }

    async fn index(&self, record: &IndexableRecord) -> Outcome<()> {
        self.index_hash_only_fields(&record.scope, &record.entity_id, &record.record_id, &record.hash_only_fields);
        Ok(())
    }

    async fn delete(&self, entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()> {
        self.store.remove(tenant_id, entity_id, record_id);
        Ok(())
    }

    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()> {
        self.store.remove_entity(tenant_id, entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::identity::EntityIdType;

    fn scope() -> TenantScope {
        TenantScope::tenant_only(TenantId::now_v7())
    }

    #[tokio::test]
    async fn indexing_then_searching_finds_the_record() {
        let strategy = TokenStrategy::new(InMemoryTokenStore::new());
        let scope = scope();
        let mut record = IndexableRecord::new(EntityId::new("crm:contact"), RecordId::new("1"), scope.clone());
        record.hash_only_fields.insert("ssn".to_string(), serde_json::json!("123-45-6789"));
        strategy.index(&record).await.unwrap();

        let query = StrategyQuery { text: "123-45-6789".to_string(), scope, entity_ids: None, limit: 10 };
        let hits = strategy.search(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record_id, RecordId::new("1"));
    }

    #[tokio::test]
    async fn records_without_hash_eligible_fields_never_match() {
        let strategy = TokenStrategy::new(InMemoryTokenStore::new());
        let scope = scope();
        let query = StrategyQuery { text: "anything".to_string(), scope, entity_ids: None, limit: 10 };
        let hits = strategy.search(&query).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_record_from_future_searches() {
        let strategy = TokenStrategy::new(InMemoryTokenStore::new());
        let scope = scope();
        let entity = EntityId::new("crm:contact");
        let record_id = RecordId::new("1");
        let mut record = IndexableRecord::new(entity.clone(), record_id.clone(), scope.clone());
        record.hash_only_fields.insert("ssn".to_string(), serde_json::json!("secretvalue"));
        strategy.index(&record).await.unwrap();
        strategy.delete(&entity, &record_id, &scope.tenant_id).await.unwrap();

        let query = StrategyQuery { text: "secretvalue".to_string(), scope, entity_ids: None, limit: 10 };
        assert!(strategy.search(&query).await.unwrap().is_empty());
    }
}
