use burrow_core::error::Result;
use burrow_core::{DeleteEntry, ShortCode, StorageError, UrlRecord};
use std::collections::HashMap;

/// Outcome of checking a record against the index before writing it.
#[derive(Debug)]
pub(crate) enum Admission {
    /// Neither the code nor the original URL is taken.
    Vacant,
    /// The original URL is already stored under another (or the same) code.
    Duplicate(UrlRecord),
}

/// In-memory record index shared by the memory and file backends.
///
/// Keeps records by short code, a reverse index by original URL, and the
/// insertion order so listings and log rewrites are stable.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordIndex {
    records: HashMap<ShortCode, UrlRecord>,
    by_original: HashMap<String, ShortCode>,
    order: Vec<ShortCode>,
}

impl RecordIndex {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Decides whether `record` may be stored.
    ///
    /// A taken original URL is reported as [`Admission::Duplicate`]; a taken
    /// short code with a different URL is a conflict.
    pub(crate) fn admit(&self, record: &UrlRecord) -> Result<Admission> {
        if let Some(code) = self.by_original.get(&record.original_url) {
            if let Some(existing) = self.records.get(code) {
                return Ok(Admission::Duplicate(existing.clone()));
            }
        }

        if self.records.contains_key(&record.code) {
            return Err(StorageError::Conflict(format!(
                "short code already taken: {}",
                record.code
            )));
        }

        Ok(Admission::Vacant)
    }

    /// Like [`RecordIndex::admit`], but a duplicate original URL is a conflict.
    pub(crate) fn admit_strict(&self, record: &UrlRecord) -> Result<()> {
        match self.admit(record)? {
            Admission::Vacant => Ok(()),
            Admission::Duplicate(existing) => Err(StorageError::Conflict(format!(
                "original url already exists: {} (code {})",
                existing.original_url, existing.code
            ))),
        }
    }

    /// Stores a record. Callers admit it first; replaying a log may call
    /// this with a code that already exists, in which case the last write
    /// wins.
    pub(crate) fn put(&mut self, record: UrlRecord) {
        if let Some(previous) = self.records.get(&record.code) {
            // another code may have claimed the old url since
            if previous.original_url != record.original_url
                && self.by_original.get(&previous.original_url) == Some(&record.code)
            {
                self.by_original.remove(&previous.original_url);
            }
        } else {
            self.order.push(record.code.clone());
        }

        self.by_original
            .insert(record.original_url.clone(), record.code.clone());
        self.records.insert(record.code.clone(), record);
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        self.records
            .get(code)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    pub(crate) fn is_deleted(&self, code: &ShortCode) -> Result<bool> {
        self.records
            .get(code)
            .map(|record| record.deleted)
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    pub(crate) fn by_owner(&self, owner: &str) -> Vec<UrlRecord> {
        self.iter()
            .filter(|record| record.is_owned_by(owner))
            .cloned()
            .collect()
    }

    /// Flags matching records as deleted and returns how many changed.
    pub(crate) fn mark_deleted(&mut self, entries: &[DeleteEntry]) -> usize {
        let mut changed = 0;
        for entry in entries {
            if let Some(record) = self.records.get_mut(&entry.code) {
                if record.is_owned_by(&entry.owner) && !record.deleted {
                    record.deleted = true;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Iterates records in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &UrlRecord> {
        self.order.iter().filter_map(|code| self.records.get(code))
    }
}
