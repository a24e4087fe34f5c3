//! Uniform queue contract shared by the in-process FIFO and an
//! out-of-process durable broker. Every strategy gets its own named queue
//! (`vector-indexing`, `fulltext-indexing`); jobs for the same
//! `(entity_type, record_id, tenant_id)` key must be processed in enqueue
//! order within one queue.

use async_trait::async_trait;
use hybrid_search_core::model::JobPayload;
use hybrid_search_core::SearchResult as Outcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub active: usize,
    pub waiting: usize,
    pub failed: usize,
    pub completed: usize,
}

impl JobCounts {
    pub fn is_idle(&self) -> bool {
        self.active == 0 && self.waiting == 0
    }
}

pub struct JobContext {
    pub job_id: String,
    pub attempt_number: u32,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, payload: JobPayload, ctx: JobContext) -> Outcome<()>;
}

#[async_trait]
pub trait Queue: Send + Sync {
    fn name(&self) -> &str;

    async fn enqueue(&self, payload: JobPayload) -> Outcome<()>;

    /// Registers the handler that drains this queue. Implementations
    /// process jobs on their own background task; this call returns once
    /// the handler is wired up, not once the queue is drained.
    async fn process(&self, handler: std::sync::Arc<dyn JobHandler>) -> Outcome<()>;

    async fn clear(&self) -> Outcome<()>;

    async fn close(&self) -> Outcome<()>;

    async fn job_counts(&self) -> Outcome<JobCounts>;
}

pub const VECTOR_INDEXING_QUEUE: &str = "vector-indexing";
pub const FULLTEXT_INDEXING_QUEUE: &str = "fulltext-indexing";

/// Partition key used to preserve ordering within a queue for jobs
/// belonging to the same logical record.
pub fn partition_key(payload: &JobPayload) -> String {
    match payload {
        JobPayload::Index { entity_type, record_id, tenant_id, .. } => format!("{tenant_id}:{entity_type}:{record_id}"),
        JobPayload::Delete { entity_type, record_id, tenant_id } => format!("{tenant_id}:{entity_type}:{record_id}"),
        JobPayload::BatchIndex { tenant_id, .. } => format!("{tenant_id}:batch"),
        JobPayload::Purge { entity_type, tenant_id } => format!("{tenant_id}:{entity_type}:purge"),
    }
}
