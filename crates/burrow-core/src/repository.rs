use crate::error::Result;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The short code identifying this record. Never reused.
    pub code: ShortCode,
    /// The original URL that was shortened. Unique per backend.
    pub original_url: String,
    /// Identity of the caller that created the record. Empty when anonymous.
    pub owner: String,
    /// Soft-delete flag. Only ever moves from `false` to `true`.
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live (not deleted) record.
    pub fn new(code: ShortCode, original_url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            code,
            original_url: original_url.into(),
            owner: owner.into(),
            deleted: false,
        }
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

/// Result of a single insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored.
    Created,
    /// The original URL was already mapped; nothing was written.
    /// Carries the existing record.
    AlreadyExists(UrlRecord),
}

/// One soft-delete request: flag `code` as deleted if it belongs to `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteEntry {
    pub code: ShortCode,
    pub owner: String,
}

impl DeleteEntry {
    pub fn new(code: ShortCode, owner: impl Into<String>) -> Self {
        Self {
            code,
            owner: owner.into(),
        }
    }
}

/// A read-only view of a repository.
///
/// Reads never hide soft-deleted records; callers check
/// [`UrlRecord::deleted`] or [`ReadRepository::is_deleted`] themselves.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Short, stable name of the backend (`"memory"`, `"file"`, `"postgres"`).
    fn backend_name(&self) -> &'static str;

    /// Retrieves the record for a given short code.
    /// Returns `Err(NotFound)` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<UrlRecord>;

    /// Returns every record created by `owner`, deleted or not.
    /// An owner with no records yields an empty list.
    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>>;

    /// Returns the soft-delete flag of a record.
    /// Returns `Err(NotFound)` if the code does not exist.
    async fn is_deleted(&self, code: &ShortCode) -> Result<bool>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a record unless its original URL is already stored.
    ///
    /// A duplicate original URL is not an error: nothing is written and
    /// [`InsertOutcome::AlreadyExists`] carries the stored record.
    /// A short code that is already taken by a different URL yields
    /// `Err(Conflict)`.
    async fn insert(&self, record: UrlRecord) -> Result<InsertOutcome>;

    /// Inserts several records.
    ///
    /// Transactional backends apply all or nothing. Non-transactional
    /// backends insert one record at a time and stop at the first failure,
    /// keeping the records written before it. A record whose original URL
    /// or short code already exists is a failure (`Err(Conflict)`).
    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Flags every entry's record as deleted when its owner matches.
    ///
    /// Unknown codes, owner mismatches and duplicate entries are skipped
    /// silently.
    async fn delete_batch(&self, entries: Vec<DeleteEntry>) -> Result<()>;

    /// Releases backend resources. Calling it twice is harmless.
    async fn close(&self) -> Result<()>;
}
