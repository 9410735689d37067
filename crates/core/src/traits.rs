use crate::error::StoreError;
use crate::models::{BulkOutcome, FileEntry, IndexAction};
use async_trait::async_trait;

/// Write side of the document store: index provisioning and bulk writes.
/// The batch indexer is generic over this so it can be exercised against
/// an in-memory fake.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    /// Creates the target index with the expected mapping if it does not
    /// exist, and verifies the vector width when it does.
    async fn ensure_index(&self, dimensions: usize) -> Result<(), StoreError>;

    /// Writes one batch of actions, returning per-item accounting. A
    /// transport-level failure is an `Err`; per-item rejections are
    /// reported inside the outcome.
    async fn bulk(&self, actions: &[IndexAction]) -> Result<BulkOutcome, StoreError>;
}

/// Read side served over HTTP.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Lists indexed chunk documents as (id, file_name, path) entries.
    /// An empty index lists as an empty vec, not an error.
    async fn list_files(&self) -> Result<Vec<FileEntry>, StoreError>;

    /// Fetches the stored full content of one chunk document by id.
    async fn get_content(&self, id: &str) -> Result<String, StoreError>;
}
