//! Storage backends for the Burrow URL shortener.
//!
//! Three interchangeable implementations of [`Repository`]:
//! [`InMemoryRepository`], [`FileRepository`] (append-only JSON-lines log)
//! and [`PostgresRepository`]. [`open_repository`] picks one from a
//! [`StorageConfig`].

pub mod backend;
pub mod file;
mod index;
pub mod memory;
pub mod postgres;

pub use backend::{open_repository, Backend, StorageConfig};
pub use burrow_core::{ReadRepository, Repository, StorageError};
pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::{PostgresConfig, PostgresRepository};
