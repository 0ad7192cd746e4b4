//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and its mapping from service errors
//! - The session gate in front of the admin API

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::repositories::{
    SqlxAdminUserRepository, SqlxCategoryRepository, SqlxListingRepository,
    SqlxLocationRepository, SqlxTagRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Session;
use crate::services::auth::{AuthError, AuthSettings, Authenticator, SESSION_COOKIE};
use crate::services::listing::{ListingService, ListingServiceError};
use crate::services::moderation::{ModerationError, ModerationService};

/// Login page browsers are sent to when their session is missing
pub const LOGIN_PATH: &str = "/admin/login";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub listing_service: Arc<ListingService>,
    pub moderation_service: Arc<ModerationService>,
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(pool: DynDatabasePool, auth: AuthSettings) -> Self {
        let listings = SqlxListingRepository::boxed(pool.clone());
        let listing_service = ListingService::new(
            listings.clone(),
            SqlxCategoryRepository::boxed(pool.clone()),
            SqlxLocationRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
        );
        let authenticator = Authenticator::new(auth, SqlxAdminUserRepository::boxed(pool.clone()));

        Self {
            pool,
            listing_service: Arc::new(listing_service),
            moderation_service: Arc::new(ModerationService::new(listings)),
            authenticator: Arc::new(authenticator),
        }
    }
}

/// Verified session of the administrator making the request
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin(pub Session);

impl<S> FromRequestParts<S> for AuthenticatedAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAdmin>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Validation failure pinned to one input field
    pub fn field_error(field: &str, message: impl Into<String>) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            message,
            serde_json::json!({ "field": field }),
        )
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new("INVALID_TRANSITION", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log `err` and answer with a generic storage failure
    fn storage(err: &anyhow::Error) -> Self {
        tracing::error!("Storage failure: {:#}", err);
        Self::internal_error("Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "INVALID_TRANSITION" | "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ListingServiceError> for ApiError {
    fn from(err: ListingServiceError) -> Self {
        match err {
            ListingServiceError::Validation { field, message } => Self::field_error(field, message),
            ListingServiceError::NotFound(_) => Self::not_found("Listing not found"),
            ListingServiceError::Conflict(msg) => Self::conflict(msg),
            ListingServiceError::InternalError(e) => Self::storage(&e),
        }
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::NotFound(_) => Self::not_found("Listing not found"),
            ModerationError::InvalidTransition { .. } => Self::invalid_transition(err.to_string()),
            ModerationError::InternalError(e) => Self::storage(&e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::Unauthenticated => {
                Self::unauthorized(err.to_string())
            }
            AuthError::InternalError(e) => Self::storage(&e),
        }
    }
}

/// Extract the session token from the `Authorization: Bearer` header or
/// the session cookie
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let prefix = format!("{}=", SESSION_COOKIE);
    for cookie_header in request.headers().get_all(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix(&prefix) {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Whether the client is a browser navigating to a page
fn wants_html(request: &Request) -> bool {
    request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Login URL that returns the browser to `request` afterwards.
///
/// Nested routers see a stripped URI, so the full one comes from
/// [`OriginalUri`] when present.
fn login_redirect(request: &Request) -> Redirect {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or_else(|| request.uri());
    let next = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&format!("{}?next={}", LOGIN_PATH, urlencoding::encode(next)))
}

/// Session gate for admin routes.
///
/// Browsers get `303 See Other` to the login page; API clients get a `401`
/// JSON error.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = extract_session_token(&request)
        .ok_or(AuthError::Unauthenticated)
        .and_then(|token| state.authenticator.verify(&token));

    match session {
        Ok(session) => {
            request.extensions_mut().insert(AuthenticatedAdmin(session));
            next.run(request).await
        }
        Err(_) if wants_html(&request) => login_redirect(&request).into_response(),
        Err(_) => ApiError::unauthorized("Authentication required").into_response(),
    }
}
