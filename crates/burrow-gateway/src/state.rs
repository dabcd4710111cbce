use std::sync::Arc;

use burrow_shortener::Shortener;

use crate::auth::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    base_url: String,
    jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        public_base_url: impl Into<String>,
        jwt: JwtKeys,
    ) -> Self {
        Self {
            shortener,
            base_url: public_base_url.into().trim_end_matches('/').to_string(),
            jwt: Arc::new(jwt),
        }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    /// Public prefix of short links, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn jwt(&self) -> &JwtKeys {
        &self.jwt
    }
}
