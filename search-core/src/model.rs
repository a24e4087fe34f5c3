//! Core data model shared by every strategy, the orchestrator and the
//! indexing pipeline.

use crate::identity::{EntityId, OrganizationId, RecordId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `(tenantId, organizationId?)`. Every stored or queried item is scoped by
/// this pair; `organization_id` absent means "tenant-wide".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    pub tenant_id: TenantId,
    pub organization_id: Option<OrganizationId>,
}

impl TenantScope {
    pub fn new(tenant_id: TenantId, organization_id: Option<OrganizationId>) -> Self {
        Self { tenant_id, organization_id }
    }

    pub fn tenant_only(tenant_id: TenantId) -> Self {
        Self { tenant_id, organization_id: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub label: String,
    pub kind: LinkKind,
}

/// Display fragments for a search result. May legitimately be empty prior
/// to enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presenter {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

impl Presenter {
    /// A title is "encrypted-looking" if it matches the deterministic
    /// envelope format `ciphertext:iv:tag:v1` emitted by the encryption
    /// service when a field could not be decrypted for presentation.
    pub fn looks_encrypted(&self) -> bool {
        match &self.title {
            Some(title) => crate::field_policy::ENCRYPTED_TITLE_PATTERN.is_match(title),
            None => false,
        }
    }

    pub fn needs_enrichment(&self, has_url: bool, has_links: bool) -> bool {
        self.title.is_none() || self.looks_encrypted() || (!has_url && !has_links)
    }
}

/// A record ready to be handed to a strategy for indexing. `fields` is the
/// full authoritative projection from the primary store; `searchable_fields`
/// and `hash_only_fields` are the field-policy projections (§4.5) the
/// indexer computes before fan-out, so that the full-text and token
/// strategies each only ever see the subset they're allowed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexableRecord {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub scope: TenantScope,
    pub fields: BTreeMap<String, Value>,
    /// Projection of `fields` safe to send to the full-text/vector drivers.
    pub searchable_fields: BTreeMap<String, Value>,
    /// Projection of `fields` whose deterministic hash is indexed by the
    /// token strategy; raw values never reach that strategy.
    pub hash_only_fields: BTreeMap<String, Value>,
    pub presenter: Option<Presenter>,
    pub url: Option<String>,
    pub links: Vec<Link>,
    /// Lazily supplied text fragments used for embedding; when absent the
    /// vector strategy derives text from `presenter` + stringly
    /// `searchable_fields`.
    pub text: Vec<String>,
    /// Overrides the source the vector strategy checksums; defaults to
    /// `{fields, presenter, url}` when absent.
    pub checksum_source: Option<Value>,
}

impl IndexableRecord {
    pub fn new(entity_id: EntityId, record_id: RecordId, scope: TenantScope) -> Self {
        Self {
            entity_id,
            record_id,
            scope,
            fields: BTreeMap::new(),
            searchable_fields: BTreeMap::new(),
            hash_only_fields: BTreeMap::new(),
            presenter: None,
            url: None,
            links: Vec::new(),
            text: Vec::new(),
            checksum_source: None,
        }
    }

    pub fn key(&self) -> crate::identity::ResultKey {
        crate::identity::ResultKey::new(self.entity_id.clone(), self.record_id.clone())
    }
}

/// A result returned by a single strategy. `score` is strategy-local until
/// the merger normalizes it via RRF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub score: f64,
    pub source: String,
    pub presenter: Option<Presenter>,
    pub url: Option<String>,
    pub links: Vec<Link>,
    pub metadata: BTreeMap<String, Value>,
}

impl SearchResult {
    pub fn key(&self) -> crate::identity::ResultKey {
        crate::identity::ResultKey::new(self.entity_id.clone(), self.record_id.clone())
    }

    pub fn needs_enrichment(&self) -> bool {
        let has_presenter_title = self.presenter.as_ref().is_some_and(|p| p.title.is_some() && !p.looks_encrypted());
        !has_presenter_title || (self.url.is_none() && self.links.is_empty())
    }
}

/// Per-entity field classification overrides declared by the host
/// application's entity config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPolicyConfig {
    pub searchable: Option<Vec<String>>,
    pub hash_only: Vec<String>,
    pub excluded: Vec<String>,
}

/// Declarative per-entity configuration.
#[derive(Debug, Clone, Default)]
pub struct EntityConfig {
    pub entity_id: EntityId,
    pub enabled: bool,
    pub strategies: Option<Vec<String>>,
    pub priority: i32,
    pub field_policy: FieldPolicyConfig,
}

/// `{ field, hashField? }`: a field is encrypted at rest; an optional
/// sibling column stores a deterministic hash usable for set-overlap
/// search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionMapEntry {
    pub field: String,
    pub hash_field: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReindexLockType {
    Fulltext,
    Vector,
}

impl std::fmt::Display for ReindexLockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReindexLockType::Fulltext => write!(f, "fulltext"),
            ReindexLockType::Vector => write!(f, "vector"),
        }
    }
}

/// At most one lock exists per `(tenant_id, lock_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexLock {
    pub lock_type: ReindexLockType,
    pub action: String,
    pub tenant_id: TenantId,
    pub organization_id: Option<OrganizationId>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

/// Union of job payloads carried on the indexing queues. Field names match
/// the wire format exactly (`entityType`/`recordId`/`tenantId`/
/// `organizationId`), not just the `jobType` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "jobType", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum JobPayload {
    Index {
        entity_type: EntityId,
        record_id: RecordId,
        tenant_id: TenantId,
        #[serde(default)]
        organization_id: Option<OrganizationId>,
    },
    Delete {
        entity_type: EntityId,
        record_id: RecordId,
        tenant_id: TenantId,
    },
    BatchIndex {
        tenant_id: TenantId,
        #[serde(default)]
        organization_id: Option<OrganizationId>,
        records: Vec<BatchIndexRecordRef>,
    },
    Purge {
        entity_type: EntityId,
        tenant_id: TenantId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchIndexRecordRef {
    pub entity_id: EntityId,
    pub record_id: RecordId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityIdType;

    #[test]
    fn job_payload_round_trips_through_json() {
        let payload = JobPayload::Index {
            entity_type: EntityId::new("crm:contact"),
            record_id: RecordId::new("42"),
            tenant_id: TenantId::now_v7(),
            organization_id: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"entityType\":\"crm:contact\""));
        let back: JobPayload = serde_json::from_str(&json).unwrap();
        match back {
            JobPayload::Index { record_id, .. } => assert_eq!(record_id, RecordId::new("42")),
            _ => panic!("expected index payload"),
        }
    }

    #[test]
    fn unknown_fields_in_job_payload_json_are_ignored() {
        let json = r#"{"jobType":"delete","entityType":"crm:contact","recordId":"1","tenantId":"00000000-0000-0000-0000-000000000000","unexpected":true}"#;
        let payload: JobPayload = serde_json::from_str(json).unwrap();
        assert!(matches!(payload, JobPayload::Delete { .. }));
    }
}
