//! Reindex lock persistence contract and the stale-lock detection rules
//! shared by the reindex controller.
//!
//! Locks live under the module-config store at
//! `search/reindex_lock:<type>:<tenantId>` so they are visible across
//! processes; this trait narrows that store down to lock-shaped
//! operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hybrid_search_core::config::ReindexConfig;
use hybrid_search_core::identity::TenantId;
use hybrid_search_core::model::{ReindexLock, ReindexLockType};
use hybrid_search_core::SearchResult as Outcome;

#[async_trait]
pub trait LockStore: Send + Sync {
    async fn read(&self, tenant_id: &TenantId, lock_type: ReindexLockType) -> Outcome<Option<ReindexLock>>;
    async fn acquire(&self, lock: ReindexLock) -> Outcome<bool>;
    async fn heartbeat(&self, tenant_id: &TenantId, lock_type: ReindexLockType, now: DateTime<Utc>) -> Outcome<()>;
    async fn clear(&self, tenant_id: &TenantId, lock_type: ReindexLockType) -> Outcome<()>;
}

/// A lock is stale if (a) it has run for longer than the absolute
/// threshold, OR (b) it has run past the idle threshold AND the queue
/// reports no active/waiting jobs, OR (c) its heartbeat is older than the
/// idle threshold under that same queue-idle condition.
pub fn is_stale(lock: &ReindexLock, now: DateTime<Utc>, queue_idle: bool, config: &ReindexConfig) -> bool {
    let elapsed = now.signed_duration_since(lock.started_at);
    let since_heartbeat = now.signed_duration_since(lock.last_heartbeat_at);

    if elapsed > chrono::Duration::from_std(config.stale_lock_absolute).unwrap_or_default() {
        return true;
    }
    let idle_threshold = chrono::Duration::from_std(config.stale_lock_idle).unwrap_or_default();
    if queue_idle && elapsed > idle_threshold {
        return true;
    }
    if queue_idle && since_heartbeat > idle_threshold {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::identity::{EntityIdType, TenantId};

    fn lock_at(started_at: DateTime<Utc>, heartbeat_at: DateTime<Utc>) -> ReindexLock {
        ReindexLock { lock_type: ReindexLockType::Vector, action: "reindex".to_string(), tenant_id: TenantId::now_v7(), organization_id: None, started_at, last_heartbeat_at: heartbeat_at }
    }

    #[test]
    fn fresh_lock_with_recent_heartbeat_and_active_queue_is_not_stale() {
        let now = Utc::now();
        let lock = lock_at(now, now);
        assert!(!is_stale(&lock, now, false, &ReindexConfig::default()));
    }

    #[test]
    fn lock_older_than_absolute_threshold_is_stale_regardless_of_queue() {
        let now = Utc::now();
        let started = now - chrono::Duration::minutes(31);
        let lock = lock_at(started, now);
        assert!(is_stale(&lock, now, false, &ReindexConfig::default()));
    }

    #[test]
    fn idle_queue_with_stale_heartbeat_reclaims_the_lock() {
        let now = Utc::now();
        let started = now - chrono::Duration::minutes(5);
        let heartbeat = now - chrono::Duration::minutes(3);
        let lock = lock_at(started, heartbeat);
        assert!(is_stale(&lock, now, true, &ReindexConfig::default()));
    }

    #[test]
    fn active_queue_tolerates_an_old_heartbeat() {
        let now = Utc::now();
        let started = now - chrono::Duration::minutes(5);
        let heartbeat = now - chrono::Duration::minutes(3);
        let lock = lock_at(started, heartbeat);
        assert!(!is_stale(&lock, now, false, &ReindexConfig::default()));
    }
}
