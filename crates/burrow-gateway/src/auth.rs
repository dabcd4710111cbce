//! Cookie-based caller identity.
//!
//! Every request outside `/ping` carries an owner id. It comes from the
//! `jwt` cookie when present; otherwise a fresh id is minted and a signed
//! cookie is attached to the response.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use jiff::Timestamp;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Name of the identity cookie.
pub const COOKIE_NAME: &str = "jwt";

/// Lifetime of an issued identity token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone, TypedBuilder)]
pub struct JwtConfig {
    #[builder(setter(into))]
    secret: String,
    #[builder(default = DEFAULT_TOKEN_TTL)]
    token_ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: String,
    exp: i64,
}

/// HS256 signing and verification keys for identity tokens.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: config.token_ttl,
        }
    }

    /// Signs a token naming `user_id`, valid for the configured lifetime.
    pub fn issue(&self, user_id: &str) -> Result<String, JwtError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id: user_id.to_string(),
            exp: Timestamp::now().as_second().saturating_add(ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Checks signature and expiry and returns the `user_id` claim.
    pub fn verify(&self, token: &str) -> Result<String, JwtError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.user_id.is_empty() {
            return Err(JwtError::from(ErrorKind::InvalidToken));
        }
        Ok(data.claims.user_id)
    }
}

/// The caller a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub owner: String,
    /// `true` when the id was minted for this request because no cookie
    /// was sent.
    pub minted: bool,
}

/// Returns the value of cookie `name`, looking through every `Cookie` header.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// Resolves the caller and stores an [`Identity`] in the request extensions.
///
/// A cookie that fails verification is rejected with `401`.
pub async fn identify(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (identity, issued) = match cookie_value(request.headers(), COOKIE_NAME) {
        Some(token) => {
            let owner = state.jwt().verify(token).map_err(|err| {
                debug!(error = %err, "rejecting identity cookie");
                AppError::Unauthorized(err.to_string())
            })?;
            (
                Identity {
                    owner,
                    minted: false,
                },
                None,
            )
        }
        None => {
            let owner = Uuid::new_v4().to_string();
            let token = state
                .jwt()
                .issue(&owner)
                .map_err(|err| AppError::Internal(format!("cannot sign identity token: {err}")))?;
            debug!(owner = %owner, "minted identity");
            (
                Identity {
                    owner,
                    minted: true,
                },
                Some(token),
            )
        }
    };

    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;

    if let Some(token) = issued {
        match HeaderValue::from_str(&format!("{COOKIE_NAME}={token}; Path=/; HttpOnly")) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => warn!(error = %err, "identity cookie is not a valid header value"),
        }
    }

    Ok(response)
}
