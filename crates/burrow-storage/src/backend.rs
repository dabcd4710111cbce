use crate::{FileRepository, InMemoryRepository, PostgresRepository};
use burrow_core::error::Result;
use burrow_core::Repository;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where records are kept, as given by the process configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// PostgreSQL connection string.
    pub database_dsn: Option<String>,
    /// Path of the JSON-lines log.
    pub file_path: Option<PathBuf>,
}

/// The backend a [`StorageConfig`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Postgres(String),
    File(PathBuf),
    Memory,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Postgres(_) => write!(f, "postgres"),
            Backend::File(path) => write!(f, "file ({})", path.display()),
            Backend::Memory => write!(f, "memory"),
        }
    }
}

impl StorageConfig {
    /// A database DSN wins over a file path; with neither, records live in
    /// memory. Empty values count as unset.
    pub fn backend(&self) -> Backend {
        if let Some(dsn) = self.database_dsn.as_ref().filter(|dsn| !dsn.is_empty()) {
            return Backend::Postgres(dsn.clone());
        }

        if let Some(path) = self
            .file_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        {
            return Backend::File(path.clone());
        }

        Backend::Memory
    }
}

/// Opens the backend selected by `config`.
pub async fn open_repository(config: &StorageConfig) -> Result<Arc<dyn Repository>> {
    let backend = config.backend();
    info!(backend = %backend, "opening storage backend");

    let repository: Arc<dyn Repository> = match backend {
        Backend::Postgres(dsn) => Arc::new(PostgresRepository::connect(&dsn).await?),
        Backend::File(path) => Arc::new(FileRepository::open(path).await?),
        Backend::Memory => Arc::new(InMemoryRepository::new()),
    };

    Ok(repository)
}
