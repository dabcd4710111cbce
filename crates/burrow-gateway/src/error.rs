use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use burrow_core::StorageError;
use burrow_shortener::ShortenerError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Shortener(err) => match err {
                ShortenerError::DuplicateOriginalUrl(_) => StatusCode::CONFLICT,
                ShortenerError::NotFound(_)
                | ShortenerError::InvalidUrl(_)
                | ShortenerError::InvalidShortCode(_) => StatusCode::BAD_REQUEST,
                ShortenerError::Storage(StorageError::Conflict(_)) => StatusCode::CONFLICT,
                ShortenerError::Entropy(_) | ShortenerError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, self.to_string()).into_response()
    }
}
