//! API route modules.

pub mod download;
pub mod formats;
pub mod health;
pub mod info;
pub mod progress;

use axum::Router;
use serde::Deserialize;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/formats", formats::router())
        .nest("/api/info", info::router())
        .nest("/api/download", download::router())
        .nest("/api/progress", progress::router())
        .nest("/health", health::router())
        .with_state(state)
}

/// `?url=` query shared by the lookup routes.
#[derive(Debug, Default, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}
