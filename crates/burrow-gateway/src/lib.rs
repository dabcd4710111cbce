//! HTTP gateway for the Burrow URL shortener.
//!
//! Exposes the shortener over axum routes, identifies callers through a
//! signed `jwt` cookie and maps service errors onto status codes.

pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use auth::{Identity, JwtConfig, JwtKeys, COOKIE_NAME};
pub use error::{AppError, Result};
pub use state::AppState;
