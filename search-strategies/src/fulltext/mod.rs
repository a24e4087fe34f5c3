//! Wraps a pluggable full-text driver with per-tenant index lifecycle
//! management and fuzzy/typo-tolerant search.

use crate::single_flight::SingleFlight;
use crate::strategy::{Strategy, StrategyQuery};
use async_trait::async_trait;
use hybrid_search_core::config::FulltextConfig;
use hybrid_search_core::field_policy::redact_presenter_for_external_store;
use hybrid_search_core::identity::{EntityId, OrganizationId, RecordId, TenantId};
use hybrid_search_core::model::{IndexableRecord, Link, Presenter, SearchResult as Hit, TenantScope};
use hybrid_search_core::{SearchError, SearchResult as Outcome};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

static NON_SAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// Per-tenant physical index name: `"<prefix>_<sanitized-tenant-id>"`,
/// replacing every character outside `[A-Za-z0-9_-]` with `_`.
pub fn index_name(prefix: &str, tenant_id: &TenantId) -> String {
    let tenant_id_str = tenant_id.to_string();
    let sanitized = NON_SAFE_CHARS.replace_all(&tenant_id_str, "_");
    format!("{prefix}_{sanitized}")
}

/// Backslash-escapes `"` and `\` for interpolation into the driver's filter
/// expression language.
pub fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone)]
pub struct FulltextFilter {
    pub organization_id: Option<OrganizationId>,
    pub entity_ids: Option<Vec<EntityId>>,
}

impl FulltextFilter {
    /// Builds the AND-joined filter expression; `organization_id` absent
    /// means "no org filter" (matches every organization, including null).
    pub fn to_expression(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(org) = &self.organization_id {
            clauses.push(format!("_organizationId = \"{}\"", escape_filter_value(&org.to_string())));
        }
        if let Some(entity_ids) = &self.entity_ids {
            let joined = entity_ids.iter().map(|id| format!("\"{}\"", escape_filter_value(id.as_str()))).collect::<Vec<_>>().join(", ");
            clauses.push(format!("_entityId IN [{joined}]"));
        }
        (!clauses.is_empty()).then(|| clauses.join(" AND "))
    }
}

#[derive(Debug, Clone)]
pub struct FulltextDocument {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub searchable_fields: BTreeMap<String, serde_json::Value>,
    pub presenter: Option<Presenter>,
    pub url: Option<String>,
    pub links: Vec<Link>,
}

#[async_trait]
pub trait FulltextDriver: Send + Sync {
    async fn ensure_index(&self, index: &str) -> Outcome<()>;
    async fn search(&self, index: &str, text: &str, filter: &FulltextFilter, limit: usize) -> Outcome<Vec<Hit>>;
    async fn index(&self, index: &str, document: FulltextDocument) -> Outcome<()>;
    async fn bulk_index(&self, index: &str, documents: Vec<FulltextDocument>) -> Outcome<()>;
    async fn delete(&self, index: &str, record_id: &RecordId) -> Outcome<()>;
    async fn purge(&self, index: &str, entity_id: &EntityId) -> Outcome<()>;
    async fn clear_index(&self, index: &str) -> Outcome<()>;
    async fn recreate_index(&self, index: &str) -> Outcome<()>;
}

/// `index_not_found` during read/delete/purge is not an error: treat as
/// empty/no-op.
fn is_index_not_found(err: &SearchError) -> bool {
    err.is_index_not_found()
}

pub struct FulltextStrategy {
    driver: Arc<dyn FulltextDriver>,
    config: FulltextConfig,
    init: SingleFlight,
    exclude_encrypted_fields: bool,
}

impl FulltextStrategy {
    pub fn new(driver: Arc<dyn FulltextDriver>, config: FulltextConfig) -> Self {
        Self { driver, config, init: SingleFlight::new(), exclude_encrypted_fields: false }
    }

    /// When set, presenters and links sent to the external driver are
    /// redacted per [`redact_presenter_for_external_store`] so encrypted
    /// fields never leave this process; the enricher re-materializes the
    /// real presenter at query time.
    pub fn with_exclude_encrypted_fields(mut self, exclude: bool) -> Self {
        self.exclude_encrypted_fields = exclude;
        self
    }

    fn index_for(&self, tenant_id: &TenantId) -> String {
        index_name(&self.config.index_prefix, tenant_id)
    }

    async fn ensure_index(&self, tenant_id: &TenantId) -> Outcome<()> {
        let driver = self.driver.clone();
        let index = self.index_for(tenant_id);
        self.init.run_once(&index.clone(), move || async move { driver.ensure_index(&index).await }).await
    }

    /// Redacts `record.presenter`/`record.links` when configured to exclude
    /// encrypted fields from the external store.
    fn presenter_and_links(&self, record: &IndexableRecord) -> (Option<Presenter>, Vec<Link>) {
        if !self.exclude_encrypted_fields {
            return (record.presenter.clone(), record.links.clone());
        }
        match &record.presenter {
            Some(presenter) => {
                let (presenter, links) = redact_presenter_for_external_store(presenter, &record.links);
                (Some(presenter), links)
            }
            None => (None, record.links.clone()),
        }
    }
}

#[async_trait]
impl Strategy for FulltextStrategy {
    fn id(&self) -> &'static str {
        "fulltext"
    }

    fn name(&self) -> &'static str {
        "Full-text fuzzy search"
    }

    fn priority(&self) -> i32 {
        3
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn ensure_ready(&self) -> Outcome<()> {
        Ok(())
    }

    async fn search(&self, query: &StrategyQuery) -> Outcome<Vec<Hit>> {
        self.ensure_index(&query.scope.tenant_id).await?;
        let index = self.index_for(&query.scope.tenant_id);
        let filter = FulltextFilter { organization_id: query.scope.organization_id, entity_ids: query.entity_ids.clone() };

        match self.driver.search(&index, &query.text, &filter, query.limit).await {
            Ok(hits) => Ok(hits),
            Err(err) if is_index_not_found(&err) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn index(&self, record: &IndexableRecord) -> Outcome<()> {
        self.ensure_index(&record.scope.tenant_id).await?;
        let index = self.index_for(&record.scope.tenant_id);
        let (presenter, links) = self.presenter_and_links(record);
        self.driver
            .index(
                &index,
                FulltextDocument {
                    entity_id: record.entity_id.clone(),
                    record_id: record.record_id.clone(),
                    organization_id: record.scope.organization_id,
                    searchable_fields: record.searchable_fields.clone(),
                    presenter,
                    url: record.url.clone(),
                    links,
                },
            )
            .await
    }

    async fn bulk_index(&self, records: &[IndexableRecord]) -> Outcome<()> {
        let Some(first) = records.first() else { return Ok(()) };
        self.ensure_index(&first.scope.tenant_id).await?;
        let index = self.index_for(&first.scope.tenant_id);
        let documents = records
            .iter()
            .map(|record| {
                let (presenter, links) = self.presenter_and_links(record);
                FulltextDocument {
                    entity_id: record.entity_id.clone(),
                    record_id: record.record_id.clone(),
                    organization_id: record.scope.organization_id,
                    searchable_fields: record.searchable_fields.clone(),
                    presenter,
                    url: record.url.clone(),
                    links,
                }
            })
            .collect();
        self.driver.bulk_index(&index, documents).await
    }

    async fn delete(&self, _entity_id: &EntityId, record_id: &RecordId, tenant_id: &TenantId) -> Outcome<()> {
        let index = self.index_for(tenant_id);
        match self.driver.delete(&index, record_id).await {
            Err(err) if is_index_not_found(&err) => Ok(()),
            other => other,
        }
    }

    async fn purge(&self, entity_id: &EntityId, tenant_id: &TenantId) -> Outcome<()> {
        let index = self.index_for(tenant_id);
        match self.driver.purge(&index, entity_id).await {
            Err(err) if is_index_not_found(&err) => Ok(()),
            other => other,
        }
    }

    async fn recreate_index(&self, tenant_id: &TenantId) -> Outcome<()> {
        let index = self.index_for(tenant_id);
        self.driver.recreate_index(&index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::identity::EntityIdType;

    #[test]
    fn index_name_sanitizes_unsafe_characters() {
        let tenant_id = TenantId::now_v7();
        let name = index_name("search", &tenant_id);
        assert!(name.starts_with("search_"));
        assert!(name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn filter_values_are_escaped() {
        assert_eq!(escape_filter_value(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn filter_expression_omits_organization_clause_when_absent() {
        let filter = FulltextFilter { organization_id: None, entity_ids: None };
        assert_eq!(filter.to_expression(), None);
    }
}
