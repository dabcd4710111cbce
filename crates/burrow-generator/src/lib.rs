pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use burrow_core::ShortCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeneratorError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage,
/// so uniqueness is probabilistic (random) or per-instance (sequential).
pub trait Generator: Send + Sync + 'static {
    /// Produces a new URL-safe short code.
    ///
    /// Fails only when the generator cannot produce a value at all, for
    /// example when the system entropy source is unavailable.
    fn generate(&self) -> Result<ShortCode>;
}
