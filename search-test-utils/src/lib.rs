//! In-memory fakes for every trait seam in the workspace, used by unit and
//! integration tests so they can exercise the real orchestration logic
//! without a real index, vector store or encryption backend.

pub mod fake_embedding;
pub mod fake_encryption;
pub mod fake_fulltext_driver;
pub mod fake_lock_store;
pub mod fake_primary_store;
pub mod fake_vector_driver;

pub use fake_embedding::FakeEmbeddingProvider;
pub use fake_encryption::FakeEncryptionService;
pub use fake_fulltext_driver::FakeFulltextDriver;
pub use fake_lock_store::FakeLockStore;
pub use fake_primary_store::FakePrimaryStore;
pub use fake_vector_driver::FakeVectorDriver;
