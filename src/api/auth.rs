//! Authentication API endpoints
//!
//! Handles HTTP requests for administrator sessions:
//! - POST /api/admin/login - Check credentials and set the session cookie
//! - POST /api/admin/logout - Clear the session cookie
//! - GET /api/admin/session - Current session (gated)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedAdmin};
use crate::models::Principal;

/// Request body for admin login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for a session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Build public auth routes (no session required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Build protected auth routes (behind the session gate)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/session", get(current_session))
}

fn set_cookie(value: &str) -> Result<HeaderMap, ApiError> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| ApiError::internal_error(format!("Invalid cookie header: {}", e)))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// POST /api/admin/login - Admin login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::validation_error(e.body_text()))?;

    let principal = state
        .authenticator
        .authenticate(body.email.trim(), &body.password)
        .await?;
    let issued = state.authenticator.issue(&principal)?;
    let headers = set_cookie(&state.authenticator.session_cookie(&issued))?;

    Ok((
        headers,
        Json(SessionResponse {
            principal,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /api/admin/logout - Clear the session cookie.
///
/// Works without a valid session so an expired cookie can still be cleared.
async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let headers = set_cookie(&state.authenticator.revoke_cookie())?;
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/admin/session - Current session
async fn current_session(admin: AuthenticatedAdmin) -> Json<SessionResponse> {
    Json(SessionResponse {
        principal: admin.0.principal,
        expires_at: admin.0.expires_at,
    })
}
