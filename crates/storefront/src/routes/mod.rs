//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health        - Health check
//!
//! # Auth API (rate limited per client IP)
//! POST /api/login     - Exchange username/password for a token pair
//! POST /api/signup    - Create an account from an email and log into it
//! ```

pub mod auth;

use axum::{
    Router,
    extract::Request,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// Create the auth API routes router.
pub fn auth_routes(rate_limited: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup));

    if rate_limited {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create all routes for the storefront.
pub fn routes(rate_limited: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api", auth_routes(rate_limited))
}

/// Build the complete application: routes, middleware and state.
pub fn app(state: AppState) -> Router {
    let rate_limited = state.config().rate_limit_auth;

    routes(rate_limited)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the upstream.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::StorefrontConfig;

    async fn app_for(server: &MockServer) -> Router {
        let endpoint = Url::parse(&format!("{}/graphql", server.uri())).unwrap();
        let state = AppState::new(StorefrontConfig::for_endpoint(endpoint)).unwrap();
        app(state)
    }

    async fn post_json(app: Router, path: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        let response = app_for(&server)
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_login_missing_password_is_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (status, body) =
            post_json(app_for(&server).await, "/api/login", r#"{"username":"shopper"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username and password are required.");
    }

    #[tokio::test]
    async fn test_login_malformed_json_is_400() {
        let server = MockServer::start().await;
        let (status, body) = post_json(app_for(&server).await, "/api/login", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_login_success_returns_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "Login" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "login": {
                    "authToken": "T1",
                    "refreshToken": "R1",
                    "user": { "username": "shopper", "roles": { "nodes": [{ "name": "customer" }] } }
                }}
            })))
            .mount(&server)
            .await;

        let (status, body) = post_json(
            app_for(&server).await,
            "/api/login",
            r#"{"username":"shopper","password":"secret"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["authToken"], "T1");
        assert_eq!(body["data"]["refreshToken"], "R1");
        assert_eq!(body["data"]["user"]["roles"], json!(["customer"]));
    }

    #[tokio::test]
    async fn test_login_rejected_is_401() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Invalid username" }]
            })))
            .mount(&server)
            .await;

        let (status, body) = post_json(
            app_for(&server).await,
            "/api/login",
            r#"{"username":"nobody","password":"secret"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid username");
    }

    #[tokio::test]
    async fn test_signup_invalid_email_is_400() {
        let server = MockServer::start().await;
        let (status, body) =
            post_json(app_for(&server).await, "/api/signup", r#"{"email":"nope"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email address");

        let (status, body) = post_json(app_for(&server).await, "/api/signup", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email is required.");
    }
}
