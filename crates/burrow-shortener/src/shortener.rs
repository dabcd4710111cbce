use crate::error::Result;
use async_trait::async_trait;
use burrow_core::{ShortCode, UrlRecord};
use tokio::task::JoinHandle;

/// Operations the HTTP layer needs from the shortener.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `owner` (empty for anonymous
    /// callers) and returns the stored record.
    ///
    /// If the URL is already stored, fails with
    /// [`ShortenerError::DuplicateOriginalUrl`](crate::ShortenerError::DuplicateOriginalUrl)
    /// carrying the existing record.
    async fn shorten(&self, original_url: &str, owner: &str) -> Result<UrlRecord>;

    /// Stores caller-supplied records, stamping each with `owner`.
    async fn add_batch(&self, records: Vec<UrlRecord>, owner: &str) -> Result<Vec<UrlRecord>>;

    /// Looks up a record by code, soft-deleted ones included.
    async fn find(&self, code: &ShortCode) -> Result<UrlRecord>;

    /// Lists every record created by `owner`.
    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>>;

    async fn is_deleted(&self, code: &ShortCode) -> Result<bool>;

    /// Schedules soft deletion of `codes` owned by `owner` and returns
    /// immediately. The returned handle completes once the batch has been
    /// handed to storage; failures are logged, never returned.
    fn delete_batch_async(&self, owner: &str, codes: Vec<ShortCode>) -> JoinHandle<()>;

    /// Waits until every delete scheduled so far has finished, whether or
    /// not its handle was kept. Used before closing storage on shutdown.
    async fn drain_deletes(&self);

    /// Checks that the storage backend is reachable.
    async fn ping(&self) -> Result<()>;
}
