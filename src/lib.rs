//! Treelock
//!
//! A single-writer edit lock for collaboratively edited family trees. The lock
//! service half serves time-bounded leases from SQLite; the client half guards
//! every graph mutation behind a lease and keeps the tree views it caches in step.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod editor;
pub mod errors;
pub mod models;
pub mod relations;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::LeaseRepository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub leases: Arc<LeaseRepository>,
    pub config: Arc<Config>,
}

/// Create the lock service router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        .route("/editor-lock", get(api::get_lock_status))
        .route("/editor-lock/acquire", post(api::acquire_lock))
        .route("/editor-lock/release", delete(api::release_lock))
        .route("/editor-lock/force-release", post(api::force_release_lock))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod test_support;
