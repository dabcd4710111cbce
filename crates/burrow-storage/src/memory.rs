use crate::index::{Admission, RecordIndex};
use async_trait::async_trait;
use burrow_core::error::Result;
use burrow_core::{
    DeleteEntry, InsertOutcome, ReadRepository, Repository, ShortCode, UrlRecord,
};
use parking_lot::RwLock;
use tracing::debug;

/// In-memory implementation of the Repository trait.
///
/// The record map and the original-URL index sit behind one `RwLock`, so
/// the duplicate check and the write of an insert happen atomically.
///
/// `insert_batch` is not transactional: records are inserted one at a time
/// and the batch stops at the first conflict, keeping the records written
/// before it.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: RwLock<RecordIndex>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, deleted ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        self.index.read().get(code)
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.index.read().by_owner(owner))
    }

    async fn is_deleted(&self, code: &ShortCode) -> Result<bool> {
        self.index.read().is_deleted(code)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, record: UrlRecord) -> Result<InsertOutcome> {
        let mut index = self.index.write();

        match index.admit(&record)? {
            Admission::Duplicate(existing) => Ok(InsertOutcome::AlreadyExists(existing)),
            Admission::Vacant => {
                index.put(record);
                Ok(InsertOutcome::Created)
            }
        }
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut index = self.index.write();

        for record in records {
            index.admit_strict(&record)?;
            index.put(record);
        }

        Ok(())
    }

    async fn delete_batch(&self, entries: Vec<DeleteEntry>) -> Result<()> {
        let changed = self.index.write().mark_deleted(&entries);
        debug!(requested = entries.len(), changed, "applied soft deletes");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
