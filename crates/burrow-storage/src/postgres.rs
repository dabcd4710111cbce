use async_trait::async_trait;
use burrow_core::error::Result;
use burrow_core::{
    DeleteEntry, InsertOutcome, ReadRepository, Repository, ShortCode, StorageError, UrlRecord,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Schema of the single `urls` table.
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// Connection settings for [`PostgresRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresConfig {
    #[builder(setter(into))]
    pub dsn: String,
    #[builder(default = 10)]
    pub max_connections: u32,
    #[builder(default = Duration::from_secs(5))]
    pub acquire_timeout: Duration,
}

/// PostgreSQL implementation of the repository contract.
///
/// Rows are keyed by a synthetic UUID; `short_url` and `original_url` are
/// both unique. Insert is an upsert that does nothing on an original-URL
/// conflict, followed by a lookup of the stored row when no row was
/// written. `insert_batch` and `delete_batch` each run in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing pool. The schema is not touched.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool with default settings and ensures the schema exists.
    pub async fn connect(dsn: &str) -> Result<Self> {
        Self::connect_with(PostgresConfig::builder().dsn(dsn).build()).await
    }

    /// Opens a pool and ensures the schema exists.
    pub async fn connect_with(config: PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.dsn)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        info!(max_connections = config.max_connections, "connected to postgres");
        Ok(repository)
    }

    /// Creates the `urls` table if it does not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_by_original(&self, original_url: &str) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM urls
            WHERE original_url = $1
            "#,
        )
        .bind(original_url)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record_from_row(&row)
    }
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let short_url: String = row.try_get("short_url").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let user_id: String = row.try_get("user_id").map_err(map_sqlx_error)?;
    let is_deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        code: ShortCode::new_unchecked(short_url),
        original_url,
        owner: user_id,
        deleted: is_deleted,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    if is_unique_violation(&err) {
        return StorageError::Conflict(message);
    }

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

/// Groups delete entries by owner so each owner costs one statement.
fn group_by_owner(entries: Vec<DeleteEntry>) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.owner)
            .or_default()
            .push(entry.code.into_string());
    }
    grouped
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, code: &ShortCode) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM urls
            WHERE short_url = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StorageError::NotFound(code.to_string())),
        }
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM urls
            WHERE user_id = $1
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn is_deleted(&self, code: &ShortCode) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT is_deleted
            FROM urls
            WHERE short_url = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        row.try_get("is_deleted").map_err(map_sqlx_error)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert(&self, record: UrlRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (uuid, short_url, original_url, user_id, is_deleted)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (original_url) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.code.as_str())
        .bind(&record.original_url)
        .bind(&record.owner)
        .bind(record.deleted)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(InsertOutcome::Created);
        }

        debug!(original_url = %record.original_url, "original url already stored, fetching existing row");
        let existing = self.find_by_original(&record.original_url).await?;
        Ok(InsertOutcome::AlreadyExists(existing))
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for record in &records {
            let result = sqlx::query(
                r#"
                INSERT INTO urls (uuid, short_url, original_url, user_id, is_deleted)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(record.code.as_str())
            .bind(&record.original_url)
            .bind(&record.owner)
            .bind(record.deleted)
            .execute(&mut *tx)
            .await;

            if let Err(err) = result {
                let mapped = map_sqlx_error(err);
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "failed to roll back batch insert");
                }
                return Err(mapped);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(count = records.len(), "inserted batch");
        Ok(())
    }

    async fn delete_batch(&self, entries: Vec<DeleteEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut changed = 0;

        for (owner, codes) in group_by_owner(entries) {
            let result = sqlx::query(
                r#"
                UPDATE urls
                SET is_deleted = TRUE
                WHERE short_url = ANY($1)
                  AND user_id = $2
                "#,
            )
            .bind(&codes)
            .bind(&owner)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            changed += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(changed, "applied soft deletes");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
