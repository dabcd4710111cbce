//! URL shortener service implementation.
//!
//! This crate provides [`ShortenerService`], the business logic sitting
//! between the HTTP layer and a storage backend, and the asynchronous
//! soft-delete pipeline in [`deletion`]. Core types are re-exported from
//! `burrow_core`.

pub mod deletion;
pub mod error;
pub mod service;
pub mod shortener;

pub use burrow_core::{DeleteEntry, ShortCode, UrlRecord};
pub use deletion::DeletionPipeline;
pub use error::{Result, ShortenerError};
pub use service::ShortenerService;
pub use shortener::Shortener;
