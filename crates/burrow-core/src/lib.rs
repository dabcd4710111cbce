//! Core types and traits for the Burrow URL shortener.
//!
//! This crate holds the record model, the short code type and the
//! [`Repository`] contract that every storage backend implements.

pub mod error;
pub mod repository;
pub mod shortcode;

pub use error::{CoreError, StorageError};
pub use repository::{DeleteEntry, InsertOutcome, ReadRepository, Repository, UrlRecord};
pub use shortcode::ShortCode;
