//! Narrow contract over the host application's encryption service, scoped
//! down to what the presenter enricher needs: fetch a per-organization
//! data-encryption key and use it to decrypt a document.

use async_trait::async_trait;
use hybrid_search_core::model::TenantScope;
use hybrid_search_core::SearchResult as Outcome;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEncryptionKey(pub Vec<u8>);

#[async_trait]
pub trait EncryptionService: Send + Sync {
    async fn data_encryption_key(&self, scope: &TenantScope) -> Outcome<DataEncryptionKey>;
    fn decrypt_document(&self, doc: &Value, key: &DataEncryptionKey) -> Value;
}
