use crate::{Generator, Result};
use burrow_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// A short code generator using a sequential counter.
///
/// This generator produces codes like "wh000000", "wh000001", etc. Codes
/// are unique within a single instance; run one prefix per process if
/// several instances share a backend. Mostly useful where deterministic
/// codes matter, such as tests and local development.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
        }
    }
}

impl SeqGenerator {
    /// Creates a new generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Creates a new generator starting from a specific counter value.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> Result<ShortCode> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(ShortCode::new_unchecked(format!("{}{:06}", self.prefix, count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_sequential_codes() {
        let generator = SeqGenerator::with_prefix("wh");

        assert_eq!(generator.generate().unwrap().as_str(), "wh000000");
        assert_eq!(generator.generate().unwrap().as_str(), "wh000001");
        assert_eq!(generator.generate().unwrap().as_str(), "wh000002");
    }

    #[test]
    fn with_offset() {
        let generator = SeqGenerator::with_offset("wh", 1000);

        assert_eq!(generator.generate().unwrap().as_str(), "wh001000");
        assert_eq!(generator.generate().unwrap().as_str(), "wh001001");
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SeqGenerator>();
    }

    #[test]
    fn clone_preserves_counter_state() {
        let generator = SeqGenerator::with_prefix("wh");
        generator.generate().unwrap();
        generator.generate().unwrap();

        let cloned = generator.clone();

        assert_eq!(generator.generate().unwrap().as_str(), "wh000002");
        assert_eq!(cloned.generate().unwrap().as_str(), "wh000002");
    }
}
