//! An in-memory reindex lock store, keyed by `(tenant_id, lock_type)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hybrid_search_core::identity::TenantId;
use hybrid_search_core::model::{ReindexLock, ReindexLockType};
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_queue::lock_store::LockStore;
use std::collections::BTreeMap;
use std::sync::RwLock;

type Key = (TenantId, String);

#[derive(Default)]
pub struct FakeLockStore {
    locks: RwLock<BTreeMap<Key, ReindexLock>>,
}

impl FakeLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tenant_id: &TenantId, lock_type: ReindexLockType) -> Key {
        (*tenant_id, lock_type.to_string())
    }
}

#[async_trait]
impl LockStore for FakeLockStore {
    async fn read(&self, tenant_id: &TenantId, lock_type: ReindexLockType) -> Outcome<Option<ReindexLock>> {
        Ok(self.locks.read().unwrap().get(&Self::key(tenant_id, lock_type)).cloned())
    }

    async fn acquire(&self, lock: ReindexLock) -> Outcome<bool> {
        let key = Self::key(&lock.tenant_id, lock.lock_type);
        let mut locks = self.locks.write().unwrap();
        if locks.contains_key(&key) {
            return Ok(false);
        }
        locks.insert(key, lock);
        Ok(true)
    }

    async fn heartbeat(&self, tenant_id: &TenantId, lock_type: ReindexLockType, now: DateTime<Utc>) -> Outcome<()> {
        if let Some(lock) = self.locks.write().unwrap().get_mut(&Self::key(tenant_id, lock_type)) {
            lock.last_heartbeat_at = now;
        }
        Ok(())
    }

    async fn clear(&self, tenant_id: &TenantId, lock_type: ReindexLockType) -> Outcome<()> {
        self.locks.write().unwrap().remove(&Self::key(tenant_id, lock_type));
        Ok(())
    }
}
