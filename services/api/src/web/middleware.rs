//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use florescer_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::AppState;

/// The id of the signed-in user, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Extracts the auth session id from the `session` cookie.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the user id.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .accounts
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                debug!("Rejected unknown or expired auth session");
                StatusCode::UNAUTHORIZED
            }
            _ => {
                error!("Failed to validate auth session: {:?}", e);
                StatusCode::SERVICE_UNAVAILABLE
            }
        })?;

    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}
