use super::bad_json;
use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::model::UserUrl;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use burrow_core::ShortCode;
use burrow_shortener::ShortenerError;

/// `GET /api/user/urls`: every link the caller created, deleted ones too.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response> {
    if identity.minted {
        return Err(AppError::Unauthorized(
            "identity cookie required".to_string(),
        ));
    }

    let records = state.shortener().get_by_owner(&identity.owner).await?;
    if records.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let urls: Vec<UserUrl> = records
        .into_iter()
        .map(|record| UserUrl {
            short_url: record.code.to_url(state.base_url()),
            original_url: record.original_url,
        })
        .collect();

    Ok(Json(urls).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of codes.
///
/// Answers `202` as soon as the deletion is scheduled.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(ids) = payload.map_err(bad_json)?;
    let codes = ids
        .into_iter()
        .map(ShortCode::new)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ShortenerError::from)?;

    drop(state.shortener().delete_batch_async(&identity.owner, codes));

    Ok(StatusCode::ACCEPTED)
}
