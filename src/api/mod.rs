//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the directory:
//! - Public listing search, detail and submission
//! - Reference options (categories, locations, tags)
//! - Admin login/logout/session
//! - Admin moderation endpoints
//! - Health check

pub mod admin;
pub mod auth;
pub mod listings;
pub mod middleware;
pub mod reference;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedAdmin};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need a valid session)
    let gated = Router::new()
        .merge(admin::router())
        .merge(auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_session,
        ));

    // Public routes
    Router::new()
        .nest("/listings", listings::router())
        .merge(reference::router())
        .nest("/admin", auth::public_router().merge(gated))
}

fn cors_layer(cors_origin: &str) -> Option<CorsLayer> {
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                .allow_credentials(true),
        ),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e);
            None
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api", build_api_router(state.clone()))
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(cors_origin) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// GET /health - Database ping
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.pool.ping().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AdminUserRepository, CategoryRepository, LocationRepository, SqlxAdminUserRepository,
        SqlxCategoryRepository, SqlxLocationRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateCategoryInput, CreateLocationInput};
    use crate::services::auth::AuthSettings;
    use crate::services::password::hash_password;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    async fn setup() -> Router {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        SqlxLocationRepository::new(pool.clone())
            .create(&CreateLocationInput::new("new-york-ny", "New York, NY"))
            .await
            .unwrap();
        SqlxCategoryRepository::new(pool.clone())
            .create(&CreateCategoryInput::new("restaurants", "Restaurants"))
            .await
            .unwrap();
        SqlxAdminUserRepository::new(pool.clone())
            .create("admin@example.com", &hash_password("changeme123").unwrap())
            .await
            .unwrap();

        build_router(
            AppState::new(pool, AuthSettings::new(KEY)),
            "http://localhost:3000",
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, cookie, body)
    }

    fn json_request(method: Method, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn submission() -> Value {
        json!({
            "name": "Joe's Pizza",
            "contactEmail": "joe@pizza.com",
            "locationId": 1,
            "categoryIds": [1],
            "description": "Best pizza in town"
        })
    }

    /// Log in and return the `name=value` part of the session cookie
    async fn login(app: &Router) -> String {
        let (status, cookie, body) = send(
            app,
            json_request(
                Method::POST,
                "/api/admin/login",
                json!({ "email": "admin@example.com", "password": "changeme123" }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["principal"]["email"], "admin@example.com");

        let cookie = cookie.expect("login sets a cookie");
        assert!(cookie.contains("HttpOnly"));
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = setup().await;
        let (status, _, body) = send(&app, get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_submission_is_hidden_until_approved() {
        let app = setup().await;

        let (status, _, body) = send(
            &app,
            json_request(Method::POST, "/api/listings", submission(), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["listing"]["slug"], "joes-pizza");
        assert_eq!(body["listing"]["status"], "pending");
        let id = body["listing"]["id"].as_i64().unwrap();

        let (_, _, body) = send(&app, get_request("/api/listings", None)).await;
        assert_eq!(body["pagination"]["total"], 0);
        assert_eq!(body["pagination"]["hasMore"], false);

        let (status, _, body) = send(&app, get_request("/api/listings/joes-pizza", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let cookie = login(&app).await;
        let (status, _, body) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/admin/listings/{id}"),
                json!({ "action": "approve" }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listing"]["status"], "approved");

        let (status, _, body) = send(&app, get_request("/api/listings/joes-pizza", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listing"]["location"]["slug"], "new-york-ny");
        assert_eq!(body["listing"]["categories"][0]["slug"], "restaurants");

        let (status, _, body) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/admin/listings/{id}"),
                json!({ "action": "reject" }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

        let (status, _, body) = send(
            &app,
            get_request(&format!("/api/admin/listings/{id}/events"), Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"].as_array().unwrap().len(), 1);
        assert_eq!(body["events"][0]["actorEmail"], "admin@example.com");
    }

    #[tokio::test]
    async fn test_submission_validation_errors() {
        let app = setup().await;

        let mut bad = submission();
        bad["contactEmail"] = json!("not-an-email");
        let (status, _, body) =
            send(&app, json_request(Method::POST, "/api/listings", bad, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "contactEmail");

        let mut bad = submission();
        bad["locationId"] = json!(99);
        let (status, _, body) =
            send(&app, json_request(Method::POST, "/api/listings", bad, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "locationId");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/listings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_admin_gate() {
        let app = setup().await;

        let (status, _, body) = send(&app, get_request("/api/admin/listings", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _, _) = send(&app, get_request("/api/admin/session", Some("session=forged.token.here"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/api/admin/listings?status=pending")
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/admin/login?next=%2Fapi%2Fadmin%2Flistings%3Fstatus%3Dpending"
        );
    }

    #[tokio::test]
    async fn test_login_session_logout() {
        let app = setup().await;

        let (status, cookie, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/admin/login",
                json!({ "email": "admin@example.com", "password": "wrong" }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(cookie.is_none());
        assert_eq!(body["error"]["message"], "Invalid credentials");

        let cookie = login(&app).await;
        let (status, _, body) = send(&app, get_request("/api/admin/session", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["principal"]["email"], "admin@example.com");

        let (status, _, body) = send(&app, get_request("/api/admin/listings?status=all", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["limit"], 20);

        let (status, cleared, _) = send(
            &app,
            json_request(Method::POST, "/api/admin/logout", json!({}), None),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(cleared.unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_unknown_action_and_listing() {
        let app = setup().await;
        let cookie = login(&app).await;

        let (status, _, body) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/admin/listings/1",
                json!({ "action": "publish" }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "action");

        let (status, _, _) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/admin/listings/999",
                json!({ "action": "approve" }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_numeric_listing_id_uses_error_envelope() {
        let app = setup().await;
        let cookie = login(&app).await;

        let (status, _, body) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/admin/listings/abc",
                json!({ "action": "approve" }),
                Some(&cookie),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "id");

        let (status, _, body) =
            send(&app, get_request("/api/admin/listings/abc/events", Some(&cookie))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_search_with_huge_offset() {
        let app = setup().await;
        let (status, _, body) = send(
            &app,
            get_request("/api/listings?offset=9223372036854775807", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listings"], json!([]));
        assert_eq!(body["pagination"]["hasMore"], false);
    }

    #[tokio::test]
    async fn test_reference_options() {
        let app = setup().await;
        let (status, _, body) = send(&app, get_request("/api/categories", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["categories"][0]["slug"], "restaurants");

        let (_, _, body) = send(&app, get_request("/api/locations", None)).await;
        assert_eq!(body["locations"][0]["name"], "New York, NY");

        let (_, _, body) = send(&app, get_request("/api/tags", None)).await;
        assert_eq!(body["tags"], json!([]));
    }
}
