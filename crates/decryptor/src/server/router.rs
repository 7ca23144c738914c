//! Axum router construction.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/key", get(handlers::public_key))
        .route("/decrypt", patch(handlers::decrypt_file))
        .route("/decryptText", post(handlers::decrypt_text))
        .route("/upload", post(handlers::upload))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
