use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

/// Middleware that checks the shared-secret header.
///
/// If `auth.api_key` (env `API_KEY`) is set, every request must carry the
/// header named by `auth.header` with exactly that value. A missing header
/// and a wrong value are both rejected with 401. Without a configured key
/// the middleware is a no-op.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.api_key() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(state.config.auth.header.as_str())
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(value) if constant_time_eq(value.as_bytes(), expected.as_bytes()) => next.run(req).await,
        Some(_) => {
            tracing::warn!("Rejected request to {} with a wrong API key", req.uri().path());
            AppError::Unauthorized("Unauthorized".to_string()).into_response()
        }
        None => AppError::Unauthorized("Unauthorized".to_string()).into_response(),
    }
}

fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected) {
        diff |= a ^ b;
    }
    diff == 0
}
