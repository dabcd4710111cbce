use burrow_core::{CoreError, StorageError, UrlRecord};
use burrow_generator::GeneratorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The original URL is already shortened. Carries the stored record so
    /// callers can answer with the existing short code.
    #[error("original url already shortened as {}", .0.code)]
    DuplicateOriginalUrl(UrlRecord),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("cannot generate short code: {0}")]
    Entropy(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}

impl From<GeneratorError> for ShortenerError {
    fn from(value: GeneratorError) -> Self {
        match value {
            GeneratorError::Entropy(message) => Self::Entropy(message),
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(code) => Self::NotFound(code),
            other => Self::Storage(other),
        }
    }
}
