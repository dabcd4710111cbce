mod health;
mod url;
mod user;

pub use health::ping_handler;
pub use url::{create_url_handler, redirect_handler, shorten_batch_handler, shorten_handler};
pub use user::{delete_user_urls_handler, user_urls_handler};

use crate::error::AppError;
use axum::extract::rejection::JsonRejection;

fn bad_json(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}
