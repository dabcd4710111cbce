use crate::index::{Admission, RecordIndex};
use async_trait::async_trait;
use burrow_core::error::Result;
use burrow_core::{
    DeleteEntry, InsertOutcome, ReadRepository, Repository, ShortCode, StorageError, UrlRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Current layout version written to every log line.
pub const LOG_VERSION: u32 = 1;

/// Layout of a log line written by this version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogLine {
    version: u32,
    uuid: String,
    user_uuid: String,
    short_url: String,
    original_url: String,
    is_deleted: bool,
}

/// Unversioned layout from before ownership and soft delete existed.
#[derive(Debug, Deserialize)]
struct LegacyLogLine {
    uuid: String,
    short_url: String,
    original_url: String,
}

#[derive(Debug, Deserialize)]
struct VersionField {
    #[serde(default)]
    version: Option<u32>,
}

impl LogLine {
    fn from_record(row_id: &str, record: &UrlRecord) -> Self {
        Self {
            version: LOG_VERSION,
            uuid: row_id.to_owned(),
            user_uuid: record.owner.clone(),
            short_url: record.code.as_str().to_owned(),
            original_url: record.original_url.clone(),
            is_deleted: record.deleted,
        }
    }

    fn into_parts(self) -> (String, UrlRecord) {
        let record = UrlRecord {
            code: ShortCode::new_unchecked(self.short_url),
            original_url: self.original_url,
            owner: self.user_uuid,
            deleted: self.is_deleted,
        };
        (self.uuid, record)
    }

    fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| StorageError::InvalidData(format!("encode log line: {e}")))?;
        line.push('\n');
        Ok(line)
    }
}

/// Parses one line of the log, dispatching on its `version` field.
fn parse_line(raw: &str, line_no: usize) -> Result<LogLine> {
    let invalid = |e: serde_json::Error| {
        StorageError::InvalidData(format!("log line {line_no}: {e}"))
    };

    let header: VersionField = serde_json::from_str(raw).map_err(invalid)?;
    match header.version {
        None => {
            let legacy: LegacyLogLine = serde_json::from_str(raw).map_err(invalid)?;
            Ok(LogLine {
                version: LOG_VERSION,
                uuid: legacy.uuid,
                user_uuid: String::new(),
                short_url: legacy.short_url,
                original_url: legacy.original_url,
                is_deleted: false,
            })
        }
        Some(LOG_VERSION) => serde_json::from_str(raw).map_err(invalid),
        Some(other) => Err(StorageError::InvalidData(format!(
            "log line {line_no}: unsupported version {other}"
        ))),
    }
}

#[derive(Debug)]
struct FileState {
    index: RecordIndex,
    row_ids: HashMap<ShortCode, String>,
    /// Append handle; `None` once the repository is closed.
    writer: Option<BufWriter<File>>,
}

impl FileState {
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| StorageError::Unavailable("file repository is closed".to_string()))
    }

    async fn append(&mut self, path: &Path, record: UrlRecord) -> Result<()> {
        let row_id = Uuid::new_v4().to_string();
        let line = LogLine::from_record(&row_id, &record).encode()?;

        // the buffer is always flushed, so this is the end of the last full line
        let writer = self.writer()?;
        let committed = writer.get_ref().metadata().await?.len();
        if let Err(err) = write_line(writer, &line).await {
            self.writer = None;
            match truncate_log(path, committed).await {
                Ok(repaired) => self.writer = Some(repaired),
                Err(repair) => warn!(
                    path = %path.display(),
                    error = %repair,
                    "cannot drop partial log line, closing file repository"
                ),
            }
            return Err(err.into());
        }

        self.row_ids.insert(record.code.clone(), row_id);
        self.index.put(record);
        Ok(())
    }

    fn snapshot(&self, index: &RecordIndex) -> Result<String> {
        let mut out = String::new();
        for record in index.iter() {
            let row_id = self
                .row_ids
                .get(&record.code)
                .cloned()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            out.push_str(&LogLine::from_record(&row_id, record).encode()?);
        }
        Ok(out)
    }
}

/// Repository persisted as an append-only JSON-lines log.
///
/// On open the whole log is replayed into an in-memory index keyed by short
/// code (a code appearing twice keeps its last line). Inserts append one
/// line. Soft deletes have no in-place representation, so `delete_batch`
/// rewrites the full log into a sibling temp file and renames it over the
/// original. The in-memory flags change only once the rename has succeeded.
///
/// A final line cut short by a crash is dropped on open. A failed append
/// truncates the log back to its last complete line.
///
/// `insert_batch` is not transactional: lines are appended one record at a
/// time and the batch stops at the first conflict, keeping earlier lines.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileRepository {
    /// Opens (creating if missing) the log at `path` and replays it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let tail_start = contents.rfind('\n').map_or(0, |i| i + 1);
        let (complete, tail) = contents.split_at(tail_start);

        let mut index = RecordIndex::default();
        let mut row_ids = HashMap::new();
        let mut line_count = 0;
        for (i, raw) in complete.lines().enumerate() {
            line_count = i + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let (row_id, record) = parse_line(raw, i + 1)?.into_parts();
            row_ids.insert(record.code.clone(), row_id);
            index.put(record);
        }

        let mut writer = if tail.trim().is_empty() {
            open_append(&path).await?
        } else if is_torn(tail) {
            warn!(
                path = %path.display(),
                line = line_count + 1,
                "dropping incomplete last log line"
            );
            truncate_log(&path, tail_start as u64).await?
        } else {
            let (row_id, record) = parse_line(tail, line_count + 1)?.into_parts();
            row_ids.insert(record.code.clone(), row_id);
            index.put(record);

            let mut writer = open_append(&path).await?;
            write_line(&mut writer, "\n").await?;
            writer
        };
        writer.flush().await?;

        info!(path = %path.display(), records = index.len(), "replayed url log");

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                index,
                row_ids,
                writer: Some(writer),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replaces the log with the contents of `next` and installs `next` as
    /// the live index. On error the live index is left untouched.
    async fn rewrite(&self, state: &mut FileState, next: RecordIndex) -> Result<()> {
        let snapshot = state.snapshot(&next)?;
        state.writer()?.flush().await?;

        let temp = self.temp_path();
        if let Err(err) = write_snapshot(&temp, &snapshot).await {
            // best effort, the temp path may not even be a file
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        fs::rename(&temp, &self.path).await?;
        state.index = next;

        // the old append handle points at the replaced file
        state.writer = None;
        state.writer = Some(open_append(&self.path).await?);
        Ok(())
    }
}

/// Whether `tail` (the text after the last newline) is a line cut short
/// mid-write rather than a complete or corrupt one.
fn is_torn(tail: &str) -> bool {
    matches!(
        serde_json::from_str::<serde::de::IgnoredAny>(tail),
        Err(ref err) if err.is_eof()
    )
}

async fn write_line(writer: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

async fn write_snapshot(path: &Path, snapshot: &str) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(snapshot.as_bytes()).await?;
    file.sync_all().await
}

async fn open_append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(BufWriter::new(file))
}

/// Cuts the log at `len` bytes and returns a fresh append handle.
async fn truncate_log(path: &Path, len: u64) -> Result<BufWriter<File>> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_all().await?;
    drop(file);
    open_append(path).await
}

#[async_trait]
impl ReadRepository for FileRepository {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        self.state.lock().await.index.get(code)
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.state.lock().await.index.by_owner(owner))
    }

    async fn is_deleted(&self, code: &ShortCode) -> Result<bool> {
        self.state.lock().await.index.is_deleted(code)
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn insert(&self, record: UrlRecord) -> Result<InsertOutcome> {
        let mut state = self.state.lock().await;

        match state.index.admit(&record)? {
            Admission::Duplicate(existing) => Ok(InsertOutcome::AlreadyExists(existing)),
            Admission::Vacant => {
                state.append(&self.path, record).await?;
                Ok(InsertOutcome::Created)
            }
        }
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut state = self.state.lock().await;

        for record in records {
            state.index.admit_strict(&record)?;
            state.append(&self.path, record).await?;
        }

        Ok(())
    }

    async fn delete_batch(&self, entries: Vec<DeleteEntry>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.writer()?;

        let mut next = state.index.clone();
        let changed = next.mark_deleted(&entries);
        if changed == 0 {
            debug!(requested = entries.len(), "no records matched soft delete");
            return Ok(());
        }

        self.rewrite(&mut state, next).await?;
        debug!(requested = entries.len(), changed, "rewrote url log after soft delete");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.writer.take() {
            Some(mut writer) => {
                writer.flush().await?;
                writer.shutdown().await?;
            }
            None => warn!(path = %self.path.display(), "file repository already closed"),
        }
        Ok(())
    }
}
