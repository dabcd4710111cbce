use crate::{Generator, GeneratorError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use burrow_core::ShortCode;
use rand::rngs::OsRng;
use rand::RngCore;
use typed_builder::TypedBuilder;

/// Smallest number of random bytes a code may be derived from.
pub const MIN_RANDOM_BYTES: usize = 6;

/// Generates short codes from operating-system randomness.
///
/// Each code is `bytes` random bytes encoded as unpadded base64url, so the
/// output only contains `[A-Za-z0-9_-]`. With the default of 6 bytes a code
/// is 8 characters long and drawn from a 2^48 space.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGenerator {
    #[builder(default = MIN_RANDOM_BYTES, setter(transform = |n: usize| n.max(MIN_RANDOM_BYTES)))]
    bytes: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> Result<ShortCode> {
        let mut buf = vec![0u8; self.bytes];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| GeneratorError::Entropy(e.to_string()))?;
        Ok(ShortCode::new_unchecked(URL_SAFE_NO_PAD.encode(&buf)))
    }
}
