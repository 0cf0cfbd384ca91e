//! Route modules for Lab Photo Server

pub mod gallery;
pub mod health;
pub mod photos;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete gallery web application
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/photos", photos::router())
        .merge(gallery::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
