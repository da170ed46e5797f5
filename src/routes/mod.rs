//! HTTP route handlers and router assembly.
//!
//! - `health`: liveness, readiness and version endpoints
//! - `users`: CRUD over the users table

pub mod health;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{auth::require_api_key, validation};
use crate::state::AppState;

/// Path prefix every route is mounted under.
pub const API_PREFIX: &str = "/api";

/// The API routes, relative to [`API_PREFIX`].
pub fn api_router(state: AppState) -> Router {
    // route_layer: the key check runs first, then body validation
    let users = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/{id}/avatar", patch(users::regenerate_avatar))
        .route_layer(from_fn(validation::validate_user_body))
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::readyz))
        .route("/version", get(health::version))
        .merge(users)
        .with_state(state)
}

/// The complete application: API under [`API_PREFIX`], allow-all CORS, request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest(API_PREFIX, api_router(state))
        .layer(DefaultBodyLimit::max(validation::MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
