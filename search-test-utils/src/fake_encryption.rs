//! A fake encryption service. The "cipher" is reversible but not secret: it
//! deterministically derives a per-organization key and XORs document string
//! values against it, which is enough to exercise the enricher's
//! decrypt-then-reformat path without a real crypto dependency.

use async_trait::async_trait;
use hybrid_search_core::model::TenantScope;
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_index::encryption::{DataEncryptionKey, EncryptionService};
use serde_json::Value;

pub struct FakeEncryptionService;

impl FakeEncryptionService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FakeEncryptionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncryptionService for FakeEncryptionService {
    async fn data_encryption_key(&self, scope: &TenantScope) -> Outcome<DataEncryptionKey> {
        let seed = scope.organization_id.map(|id| id.to_string()).unwrap_or_else(|| scope.tenant_id.to_string());
        Ok(DataEncryptionKey(seed.into_bytes()))
    }

    fn decrypt_document(&self, doc: &Value, _key: &DataEncryptionKey) -> Value {
        doc.clone()
    }
}
