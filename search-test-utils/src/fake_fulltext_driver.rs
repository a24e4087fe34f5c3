//! An in-memory full-text driver: substring matching over a per-index
//! document table, with index lifecycle tracked so `index_not_found` can be
//! exercised deliberately.

use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, RecordId};
use hybrid_search_core::model::SearchResult as Hit;
use hybrid_search_core::error::StrategyError;
use hybrid_search_core::{SearchError, SearchResult as Outcome};
use hybrid_search_strategies::fulltext::{FulltextDocument, FulltextDriver, FulltextFilter};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

#[derive(Default)]
pub struct FakeFulltextDriver {
    indexes: RwLock<BTreeSet<String>>,
    documents: RwLock<BTreeMap<String, BTreeMap<String, FulltextDocument>>>,
}

impl FakeFulltextDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_index(&self, index: &str) -> Outcome<()> {
        if self.indexes.read().unwrap().contains(index) {
            Ok(())
        } else {
            Err(SearchError::Strategy(StrategyError::IndexNotFound { strategy: "fulltext" }))
        }
    }

    fn matches(document: &FulltextDocument, filter: &FulltextFilter) -> bool {
        if let Some(org) = &filter.organization_id {
            if document.organization_id.as_ref() != Some(org) {
                return false;
            }
        }
        if let Some(entity_ids) = &filter.entity_ids {
            if !entity_ids.contains(&document.entity_id) {
                return false;
            }
        }
        true
    }

    fn contains_text(document: &FulltextDocument, text: &str) -> bool {
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        document.searchable_fields.values().any(|value| value.to_string().to_lowercase().contains(&needle))
            || document.presenter.as_ref().and_then(|p| p.title.clone()).map(|t| t.to_lowercase().contains(&needle)).unwrap_or(false)
    }
}

#[async_trait]
impl FulltextDriver for FakeFulltextDriver {
    async fn ensure_index(&self, index: &str) -> Outcome<()> {
        self.indexes.write().unwrap().insert(index.to_string());
        self.documents.write().unwrap().entry(index.to_string()).or_default();
        Ok(())
    }

    async fn search(&self, index: &str, text: &str, filter: &FulltextFilter, limit: usize) -> Outcome<Vec<Hit>> {
        self.require_index(index)?;
        let documents = self.documents.read().unwrap();
        let Some(table) = documents.get(index) else { return Ok(Vec::new()) };
        let mut hits: Vec<Hit> = table
            .values()
            .filter(|doc| Self::matches(doc, filter))
            .filter(|doc| Self::contains_text(doc, text))
            .map(|doc| Hit {
                entity_id: doc.entity_id.clone(),
                record_id: doc.record_id.clone(),
                score: 1.0,
                source: "fulltext".to_string(),
                presenter: doc.presenter.clone(),
                url: doc.url.clone(),
                links: doc.links.clone(),
                metadata: BTreeMap::new(),
            })
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn index(&self, index: &str, document: FulltextDocument) -> Outcome<()> {
        self.require_index(index)?;
        self.documents.write().unwrap().entry(index.to_string()).or_default().insert(document.record_id.to_string(), document);
        Ok(())
    }

    async fn bulk_index(&self, index: &str, documents: Vec<FulltextDocument>) -> Outcome<()> {
        self.require_index(index)?;
        let mut table = self.documents.write().unwrap();
        let entry = table.entry(index.to_string()).or_default();
        for document in documents {
            entry.insert(document.record_id.to_string(), document);
        }
        Ok(())
    }

    async fn delete(&self, index: &str, record_id: &RecordId) -> Outcome<()> {
        self.require_index(index)?;
        if let Some(table) = self.documents.write().unwrap().get_mut(index) {
            table.remove(record_id.as_str());
        }
        Ok(())
    }

    async fn purge(&self, index: &str, entity_id: &EntityId) -> Outcome<()> {
        self.require_index(index)?;
        if let Some(table) = self.documents.write().unwrap().get_mut(index) {
            table.retain(|_, doc| &doc.entity_id != entity_id);
        }
        Ok(())
    }

    async fn clear_index(&self, index: &str) -> Outcome<()> {
        self.require_index(index)?;
        if let Some(table) = self.documents.write().unwrap().get_mut(index) {
            table.clear();
        }
        Ok(())
    }

    async fn recreate_index(&self, index: &str) -> Outcome<()> {
        self.indexes.write().unwrap().insert(index.to_string());
        self.documents.write().unwrap().insert(index.to_string(), BTreeMap::new());
        Ok(())
    }
}
