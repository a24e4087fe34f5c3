//! Translates upstream entity-mutation events into queue jobs. Subscribers
//! are cheap, non-persistent (an unsubscribed topic silently drops), and
//! look up a missing `tenant_id`/`organization_id` from the row only when
//! the event itself omits them.

use crate::queue::Queue;
use hybrid_search_core::identity::{EntityId, OrganizationId, RecordId, TenantId};
use hybrid_search_core::model::JobPayload;
use hybrid_search_core::SearchResult as Outcome;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct IndexRecordEvent {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub tenant_id: Option<TenantId>,
    pub organization_id: Option<OrganizationId>,
}

#[derive(Debug, Clone)]
pub struct DeleteRecordEvent {
    pub entity_id: EntityId,
    pub record_id: RecordId,
    pub tenant_id: Option<TenantId>,
}

/// Resolves a tenant id missing from an event by looking up the owning
/// row; kept as a trait so the subscriber stays independent of the
/// concrete primary-store implementation.
#[async_trait::async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve_tenant(&self, entity_id: &EntityId, record_id: &RecordId) -> Outcome<Option<TenantId>>;
}

pub struct EventSubscriber {
    queue: Arc<dyn Queue>,
    resolver: Arc<dyn TenantResolver>,
    enabled: bool,
}

impl EventSubscriber {
    pub fn new(queue: Arc<dyn Queue>, resolver: Arc<dyn TenantResolver>, enabled: bool) -> Self {
        Self { queue, resolver, enabled }
    }

    pub async fn on_index_record(&self, event: IndexRecordEvent) -> Outcome<()> {
        if !self.enabled {
            return Ok(());
        }
        let tenant_id = match event.tenant_id {
            Some(id) => id,
            None => match self.resolver.resolve_tenant(&event.entity_id, &event.record_id).await? {
                Some(id) => id,
                None => return Ok(()),
            },
        };
        self.queue
            .enqueue(JobPayload::Index { entity_type: event.entity_id, record_id: event.record_id, tenant_id, organization_id: event.organization_id })
            .await
    }

    pub async fn on_delete_record(&self, event: DeleteRecordEvent) -> Outcome<()> {
        if !self.enabled {
            return Ok(());
        }
        let tenant_id = match event.tenant_id {
            Some(id) => id,
            None => match self.resolver.resolve_tenant(&event.entity_id, &event.record_id).await? {
                Some(id) => id,
                None => return Ok(()),
            },
        };
        self.queue.enqueue(JobPayload::Delete { entity_type: event.entity_id, record_id: event.record_id, tenant_id }).await
    }
}
