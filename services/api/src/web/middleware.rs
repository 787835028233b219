//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Lets the request through only while the persisted session marker is present.
/// Returns 401 Unauthorized otherwise.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let active = state.sessions.is_active().await.map_err(|e| {
        error!("Failed to read session state: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if !active {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}
