use crate::deletion::DeletionPipeline;
use crate::error::{Result, ShortenerError};
use crate::shortener::Shortener;
use async_trait::async_trait;
use burrow_core::{InsertOutcome, Repository, ShortCode, UrlRecord};
use burrow_generator::Generator;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use url::Url;

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` to handle:
/// - Short code generation
/// - URL validation
/// - Translating "already stored" into [`ShortenerError::DuplicateOriginalUrl`]
/// - Scheduling soft deletes through the [`DeletionPipeline`] and keeping
///   track of them until they finish
///
/// Note: The `Generator` implementation is responsible for ensuring
/// uniqueness of generated short codes. No collision retry is performed;
/// a taken code surfaces as a storage conflict.
pub struct ShortenerService<R: ?Sized, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    pipeline: DeletionPipeline,
    deletes: TaskTracker,
}

impl<R: ?Sized, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            pipeline: self.pipeline,
            deletes: self.deletes.clone(),
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    /// Creates a new `ShortenerService` owning `repository`.
    pub fn new(repository: R, generator: G) -> Self {
        Self::from_shared(Arc::new(repository), generator)
    }
}

impl<R: Repository + ?Sized, G: Generator> ShortenerService<R, G> {
    /// Creates a service over an already shared repository, such as the
    /// `Arc<dyn Repository>` returned by `burrow_storage::open_repository`.
    pub fn from_shared(repository: Arc<R>, generator: G) -> Self {
        Self {
            repository,
            generator: Arc::new(generator),
            pipeline: DeletionPipeline::default(),
            deletes: TaskTracker::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: DeletionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Accepts absolute http(s) URLs with a host.
    fn validate_url(raw: &str) -> Result<()> {
        if raw.trim().is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let parsed =
            Url::parse(raw).map_err(|e| ShortenerError::InvalidUrl(format!("{raw}: {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ShortenerError::InvalidUrl(format!(
                    "URL scheme must be http or https: {other}"
                )))
            }
        }

        if parsed.host().is_none() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {raw}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl<R: Repository + ?Sized, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, original_url: &str, owner: &str) -> Result<UrlRecord> {
        Self::validate_url(original_url)?;

        let code = self.generator.generate()?;
        let record = UrlRecord::new(code, original_url, owner);

        match self.repository.insert(record.clone()).await? {
            InsertOutcome::Created => {
                debug!(code = %record.code, owner, "shortened url");
                Ok(record)
            }
            InsertOutcome::AlreadyExists(existing) => {
                debug!(code = %existing.code, "original url already shortened");
                Err(ShortenerError::DuplicateOriginalUrl(existing))
            }
        }
    }

    async fn add_batch(&self, records: Vec<UrlRecord>, owner: &str) -> Result<Vec<UrlRecord>> {
        let mut stamped = Vec::with_capacity(records.len());
        for record in records {
            Self::validate_url(&record.original_url)?;
            let code = ShortCode::new(record.code.into_string())?;
            stamped.push(UrlRecord::new(code, record.original_url, owner));
        }

        if stamped.is_empty() {
            return Ok(stamped);
        }

        self.repository.insert_batch(stamped.clone()).await?;
        debug!(count = stamped.len(), owner, "added batch");
        Ok(stamped)
    }

    async fn find(&self, code: &ShortCode) -> Result<UrlRecord> {
        Ok(self.repository.get(code).await?)
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.repository.get_by_owner(owner).await?)
    }

    async fn is_deleted(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.repository.is_deleted(code).await?)
    }

    fn delete_batch_async(&self, owner: &str, codes: Vec<ShortCode>) -> JoinHandle<()> {
        info!(owner, count = codes.len(), "scheduling soft delete");

        let repository = Arc::clone(&self.repository);
        let pipeline = self.pipeline;
        let owner = owner.to_owned();
        self.deletes
            .spawn(async move { pipeline.run(repository.as_ref(), &owner, codes).await })
    }

    async fn drain_deletes(&self) {
        self.deletes.close();
        let pending = self.deletes.len();
        if pending > 0 {
            info!(pending, "waiting for scheduled soft deletes");
        }
        self.deletes.wait().await;
        self.deletes.reopen();
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.repository.ping().await?)
    }
}
