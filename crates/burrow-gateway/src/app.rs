use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::auth::identify;
use crate::handlers::{
    create_url_handler, delete_user_urls_handler, ping_handler, redirect_handler,
    shorten_batch_handler, shorten_handler, user_urls_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    /// Builds the gateway router. Everything except `/ping` runs behind
    /// the identity middleware.
    pub fn router(state: AppState) -> Router {
        let identified = Router::new()
            .route("/", post(create_url_handler))
            .route("/{id}", get(redirect_handler))
            .route("/api/shorten", post(shorten_handler))
            .route("/api/shorten/batch", post(shorten_batch_handler))
            .route(
                "/api/user/urls",
                get(user_urls_handler).delete(delete_user_urls_handler),
            )
            .route_layer(middleware::from_fn_with_state(state.clone(), identify));

        Router::new()
            .route("/ping", get(ping_handler))
            .merge(identified)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestDecompressionLayer::new())
                    .layer(CompressionLayer::new()),
            )
            .with_state(state)
    }
}
