//! Contract for the external primary row store: paginated scan for reindex,
//! point lookups for the indexer, and batched `entity_indexes` reads for
//! the presenter enricher.

use crate::row::Row;
use async_trait::async_trait;
use hybrid_search_core::identity::{EntityId, RecordId};
use hybrid_search_core::model::{Presenter, TenantScope};
use hybrid_search_core::SearchResult as Outcome;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct RowPage {
    pub items: Vec<Row>,
    pub total: usize,
}

/// A decrypted (or plaintext) document backing a presenter enrichment
/// lookup, mirroring one row of the `entity_indexes` table.
#[derive(Debug, Clone)]
pub struct EntityIndexRow {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub scope: TenantScope,
    pub doc: Value,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[async_trait]
pub trait PrimaryStore: Send + Sync {
    async fn query_page(&self, entity_id: &EntityId, scope: &TenantScope, page: PageRequest, include_custom_fields: bool) -> Outcome<RowPage>;

    async fn load_row(&self, entity_id: &EntityId, record_id: &RecordId, scope: &TenantScope) -> Outcome<Option<Row>>;

    /// Batched lookup used by the enricher; `requests` is a list of
    /// `(entity_id, record_ids)` pairs, each already chunked by the caller
    /// to respect the enrichment chunk-size limit. Scope predicates:
    /// `tenant_id = scope.tenant_id` and `organization_id = scope.organization_id
    /// OR organization_id IS NULL`.
    async fn fetch_entity_index_rows(&self, requests: &[(EntityId, Vec<RecordId>)], scope: &TenantScope) -> Outcome<Vec<EntityIndexRow>>;
}

/// Convenience extraction used by the enricher's fallback-presenter rules.
pub fn fallback_title(fields: &serde_json::Map<String, Value>) -> Option<String> {
    const PRIORITY: &[&str] = &[
        "display_name", "name", "title", "label", "full_name", "brand_name", "legal_name", "first_name", "last_name", "preferred_name", "email", "primary_email", "code", "sku", "reference", "identifier", "slug",
    ];
    for key in PRIORITY {
        if let Some(Value::String(s)) = fields.get(*key) {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}

const SCOPE_OR_TIMESTAMP_KEYS: &[&str] = &["tenant_id", "organization_id", "created_at", "updated_at", "deleted_at", "id"];

pub fn fallback_any_string_field(fields: &serde_json::Map<String, Value>) -> Option<String> {
    fields
        .iter()
        .filter(|(key, _)| !SCOPE_OR_TIMESTAMP_KEYS.contains(&key.as_str()))
        .find_map(|(_, value)| match value {
            Value::String(s) if s.len() < 200 => Some(s.clone()),
            _ => None,
        })
}

pub fn fallback_subtitle(fields: &serde_json::Map<String, Value>, title: Option<&str>) -> Option<String> {
    const PRIORITY: &[&str] = &["description", "summary", "notes", "email", "primary_email", "phone", "primary_phone", "status", "type", "kind", "category"];
    let parts: Vec<String> = PRIORITY
        .iter()
        .filter_map(|key| match fields.get(*key) {
            Some(Value::String(s)) if !s.is_empty() && Some(s.as_str()) != title => Some(s.clone()),
            _ => None,
        })
        .take(3)
        .collect();
    if parts.is_empty() {
        return None;
    }
    let joined = parts.join(" · ");
    Some(if joined.len() > 120 { joined.chars().take(120).collect() } else { joined })
}

pub fn fallback_presenter(entity_label: &str, record_id: &str, fields: &serde_json::Map<String, Value>) -> Presenter {
    let title = fallback_title(fields).or_else(|| fallback_any_string_field(fields)).unwrap_or_else(|| {
        let short_id: String = record_id.chars().take(8).collect();
        let suffix = if record_id.len() > 8 { "..." } else { "" };
        format!("{entity_label} {short_id}{suffix}")
    });
    let subtitle = fallback_subtitle(fields, Some(title.as_str()));
    let badge = title_case_last_segment(entity_label);
    Presenter { title: Some(title), subtitle, icon: None, badge: Some(badge) }
}

fn title_case_last_segment(entity_label: &str) -> String {
    let last = entity_label.rsplit(':').next().unwrap_or(entity_label);
    last.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn fallback_title_prefers_display_name() {
        let fields = obj(&[("display_name", json!("Ada")), ("name", json!("Ignored"))]);
        assert_eq!(fallback_title(&fields), Some("Ada".to_string()));
    }

    #[test]
    fn fallback_presenter_truncates_short_id_when_longer_than_eight_chars() {
        let presenter = fallback_presenter("crm:contact", "123456789012", &obj(&[]));
        assert_eq!(presenter.title, Some("crm:contact 12345678...".to_string()));
    }

    #[test]
    fn title_case_last_segment_splits_on_underscore() {
        assert_eq!(title_case_last_segment("crm:service_ticket"), "Service Ticket");
    }
}
