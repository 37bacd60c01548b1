//! `/api/login` and `/api/signup` against a stubbed commerce API.

use imported_integration_tests::{TestContext, mount_login};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::start().await;
    let response = reqwest::get(ctx.url("/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_login_missing_fields_never_reaches_upstream() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&ctx.upstream)
        .await;

    for body in [
        r#"{"username":"","password":"secret"}"#,
        r#"{"username":"shopper","password":""}"#,
        r#"{"username":"shopper"}"#,
        "{}",
    ] {
        let (status, body) = ctx.post_json("/api/login", body).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Username and password are required.");
    }
}

#[tokio::test]
async fn test_login_returns_payload_with_flat_roles() {
    let ctx = TestContext::start().await;
    mount_login(&ctx.upstream, "T1", "R1").await;

    let (status, body) = ctx
        .post_json("/api/login", r#"{"username":"shopper","password":"secret"}"#)
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["authToken"], "T1");
    assert_eq!(body["data"]["refreshToken"], "R1");
    assert_eq!(body["data"]["user"]["displayName"], "Shop Per");
    assert_eq!(body["data"]["user"]["roles"], json!(["customer"]));

    let sent = ctx.operations("Login").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["variables"]["username"], "shopper");
}

#[tokio::test]
async fn test_login_upstream_rejection_is_401() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "The provided password is invalid" }],
            "data": { "login": null }
        })))
        .mount(&ctx.upstream)
        .await;

    let (status, body) = ctx
        .post_json("/api/login", r#"{"username":"shopper","password":"wrong"}"#)
        .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "The provided password is invalid");
}

#[tokio::test]
async fn test_login_garbage_upstream_is_500() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>down</html>"))
        .mount(&ctx.upstream)
        .await;

    let (status, body) = ctx
        .post_json("/api/login", r#"{"username":"shopper","password":"secret"}"#)
        .await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "Unexpected error");
}

#[tokio::test]
async fn test_signup_registers_logs_in_and_requests_reset() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "RegisterUser" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "registerUser": { "user": { "id": "dXNlcjo5" } } }
        })))
        .expect(1)
        .mount(&ctx.upstream)
        .await;
    mount_login(&ctx.upstream, "T1", "R1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "SendPasswordReset",
            "variables": { "username": "jane.doe@example.com" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "sendPasswordResetEmail": { "success": true } }
        })))
        .mount(&ctx.upstream)
        .await;

    let (status, body) = ctx
        .post_json("/api/signup", r#"{"email":"Jane.Doe@example.com"}"#)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["authToken"], "T1");

    let register = ctx.operations("RegisterUser").await;
    let username = register[0]["variables"]["username"].as_str().unwrap();
    let (base, suffix) = username.rsplit_once('-').unwrap();
    assert_eq!(base, "janedoe");
    assert_eq!(suffix.len(), 4);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let password = register[0]["variables"]["password"].as_str().unwrap();
    let login = ctx.operations("Login").await;
    assert_eq!(login[0]["variables"]["username"], username);
    assert_eq!(login[0]["variables"]["password"], password);

    assert_eq!(ctx.wait_for_operation("SendPasswordReset").await.len(), 1);
}

#[tokio::test]
async fn test_signup_passwords_differ() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "RegisterUser" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "registerUser": { "user": null } }
        })))
        .mount(&ctx.upstream)
        .await;
    mount_login(&ctx.upstream, "T1", "R1").await;

    for _ in 0..3 {
        let (status, _) = ctx.post_json("/api/signup", r#"{"email":"ab@example.com"}"#).await;
        assert_eq!(status, 200);
    }

    let register = ctx.operations("RegisterUser").await;
    let mut passwords: Vec<&str> = register
        .iter()
        .map(|r| r["variables"]["password"].as_str().unwrap())
        .collect();
    for r in &register {
        assert!(r["variables"]["username"].as_str().unwrap().starts_with("imported-"));
    }
    passwords.sort_unstable();
    passwords.dedup();
    assert_eq!(passwords.len(), 3);
}

#[tokio::test]
async fn test_signup_validation() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&ctx.upstream)
        .await;

    let (status, body) = ctx.post_json("/api/signup", r#"{"email":""}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Email is required.");

    let (status, _) = ctx.post_json("/api/signup", r#"{"email":"not-an-email"}"#).await;
    assert_eq!(status, 400);

    let (status, _) = ctx.post_json("/api/signup", "not json").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_signup_duplicate_email_is_400_with_upstream_message() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "RegisterUser" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "This email address is already registered." }]
        })))
        .mount(&ctx.upstream)
        .await;

    let (status, body) = ctx
        .post_json("/api/signup", r#"{"email":"taken@example.com"}"#)
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "This email address is already registered.");
    assert!(ctx.operations("Login").await.is_empty());
}

#[tokio::test]
async fn test_signup_autologin_failure_is_500() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "RegisterUser" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "registerUser": { "user": { "id": "dXNlcjo5" } } }
        })))
        .mount(&ctx.upstream)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "Login" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "login": null }
        })))
        .mount(&ctx.upstream)
        .await;

    let (status, body) = ctx
        .post_json("/api/signup", r#"{"email":"new@example.com"}"#)
        .await;
    assert_eq!(status, 500);
    assert!(body["error"].is_string());
    assert!(ctx.operations("SendPasswordReset").await.is_empty());
}

#[tokio::test]
async fn test_auth_endpoints_are_rate_limited() {
    let ctx = TestContext::start_with(|config| config.rate_limit_auth = true).await;

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let (status, _) = ctx.post_json("/api/login", "{}").await;
        statuses.push(status);
    }

    assert_eq!(&statuses[..5], &[400; 5]);
    assert_eq!(statuses[5], 429);

    let health = reqwest::get(ctx.url("/health")).await.unwrap();
    assert_eq!(health.status(), 200);
}
