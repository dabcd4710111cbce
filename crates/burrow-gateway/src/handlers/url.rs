use super::bad_json;
use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::model::{BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use burrow_core::{ShortCode, UrlRecord};
use burrow_shortener::ShortenerError;
use tracing::{debug, info};

/// `POST /` with the URL as a plain-text body.
pub async fn create_url_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: String,
) -> Result<Response> {
    let original_url = body.trim();
    if original_url.is_empty() {
        return Err(AppError::BadRequest("Empty body!".to_string()));
    }

    let (status, code) = match state.shortener().shorten(original_url, &identity.owner).await {
        Ok(record) => (StatusCode::CREATED, record.code),
        Err(ShortenerError::DuplicateOriginalUrl(existing)) => {
            (StatusCode::CONFLICT, existing.code)
        }
        Err(err) => return Err(err.into()),
    };

    Ok((
        status,
        [(CONTENT_TYPE, "text/plain")],
        code.to_url(state.base_url()),
    )
        .into_response())
}

/// `GET /{id}`: redirects to the original URL.
pub async fn redirect_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let code = ShortCode::new(id).map_err(ShortenerError::from)?;
    let record = state.shortener().find(&code).await?;

    if record.deleted {
        debug!(code = %code, "short code was deleted");
        return Ok(StatusCode::GONE.into_response());
    }

    Ok(Redirect::temporary(&record.original_url).into_response())
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(bad_json)?;
    if request.url.is_empty() {
        return Err(AppError::BadRequest("Empty URL!".to_string()));
    }

    let (status, code) = match state.shortener().shorten(&request.url, &identity.owner).await {
        Ok(record) => (StatusCode::CREATED, record.code),
        Err(ShortenerError::DuplicateOriginalUrl(existing)) => {
            info!(original_url = %existing.original_url, "original url already exists");
            (StatusCode::CONFLICT, existing.code)
        }
        Err(err) => return Err(err.into()),
    };

    let response = ShortenResponse {
        result: code.to_url(state.base_url()),
    };
    Ok((status, Json(response)).into_response())
}

/// `POST /api/shorten/batch`: stores caller-chosen codes in one call.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<Vec<BatchRequestItem>>, JsonRejection>,
) -> Result<Response> {
    let Json(items) = payload.map_err(bad_json)?;
    if items.is_empty() {
        return Err(AppError::BadRequest("Empty batch!".to_string()));
    }

    // codes are validated by the service before anything is stored
    let records = items
        .into_iter()
        .map(|item| {
            UrlRecord::new(
                ShortCode::new_unchecked(item.correlation_id),
                item.original_url,
                "",
            )
        })
        .collect();

    let stored = state
        .shortener()
        .add_batch(records, &identity.owner)
        .await?;

    let response: Vec<BatchResponseItem> = stored
        .into_iter()
        .map(|record| BatchResponseItem {
            short_url: record.code.to_url(state.base_url()),
            correlation_id: record.code.into_string(),
        })
        .collect();

    Ok((StatusCode::CREATED, Json(response)).into_response())
}
