//! Metadatify search and counter service.
//!
//! Query translation for the visual query builder, workspace-scoped Entity
//! search, and identifier sequences, served over HTTP.

pub mod config;
pub mod counter;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod search;
pub mod state;
pub mod store;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::search::router())
        .merge(routes::counter::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
