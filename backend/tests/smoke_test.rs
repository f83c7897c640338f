//! Security chain behaviour with fake verifier and directory.

mod common;

use std::sync::Arc;

use accounts_backend::routes;
use accounts_backend::test_util::{claims_for, test_state, InMemoryDirectory, StaticVerifier};
use accounts_backend::UserDirectory;
use axum::body::Body;
use axum::Router;
use http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::send;

const NEW_USER: &str = "token-new";
const INCOMPLETE: &str = "token-incomplete";
const COMPLETE: &str = "token-complete";
const NO_SUBJECT: &str = "token-no-sub";

fn app_with(directory: Arc<InMemoryDirectory>) -> Router {
    let mut no_sub = claims_for("ignored", None);
    no_sub.sub = None;

    let verifier = StaticVerifier::new()
        .with_token(NEW_USER, claims_for("auth0|new", Some("new@x.com")))
        .with_token(INCOMPLETE, claims_for("auth0|incomplete", Some("inc@x.com")))
        .with_token(COMPLETE, claims_for("auth0|complete", Some("c@x.com")))
        .with_token(NO_SUBJECT, no_sub);

    routes::app(test_state(verifier, directory))
}

fn seeded() -> Arc<InMemoryDirectory> {
    let directory = Arc::new(InMemoryDirectory::with_default_role());
    directory.insert_incomplete_user("auth0|incomplete", "inc@x.com");
    directory.insert_complete_user("auth0|complete", "carol", "c@x.com");
    directory
}

#[tokio::test]
async fn test_public_endpoints_without_token() {
    let app = app_with(seeded());

    let resp = send(&app, Method::GET, "/public/hello", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!("Hello World"));

    let resp = send(&app, Method::GET, "/public/roles", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!([{"id": 1, "code": "USER"}]));

    let resp = send(&app, Method::GET, "/actuator/health", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["status"], "UP");
}

#[tokio::test]
async fn test_protected_endpoints_require_token() {
    let app = app_with(seeded());

    for uri in ["/api/users/me", "/api/users/you", "/api/anything"] {
        let resp = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(resp.body["error"], "UNAUTHORIZED");
    }

    let resp = send(
        &app,
        Method::POST,
        "/api/users/profile",
        None,
        Some(json!({"username": "x", "birthdate": "1990-01-01"})),
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = app_with(seeded());

    let resp = send(&app, Method::GET, "/public/hello", Some("garbage"), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["message"], "Invalid bearer token.");
}

#[tokio::test]
async fn test_basic_auth_is_treated_as_anonymous() {
    let app = app_with(seeded());

    let request = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap()
    };

    let resp = app.clone().oneshot(request("/public/hello")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(request("/api/users/me")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
}

#[tokio::test]
async fn test_unregistered_identity_is_gated() {
    let app = app_with(seeded());

    for uri in ["/api/users/me", "/api/users/you", "/public/hello", "/api/unknown"] {
        let resp = send(&app, Method::GET, uri, Some(NEW_USER), None).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert_eq!(
            resp.body,
            json!({
                "error": "PROFILE_SETUP_REQUIRED",
                "message": "User profile setup is incomplete."
            })
        );
    }
}

#[tokio::test]
async fn test_incomplete_profile_is_gated() {
    let app = app_with(seeded());

    let resp = send(&app, Method::GET, "/api/users/me", Some(INCOMPLETE), None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.body["error"], "PROFILE_SETUP_REQUIRED");
}

#[tokio::test]
async fn test_token_without_subject_is_gated() {
    let app = app_with(seeded());

    let resp = send(&app, Method::GET, "/api/users/me", Some(NO_SUBJECT), None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_complete_profile_passes() {
    let app = app_with(seeded());

    let resp = send(&app, Method::GET, "/api/users/me", Some(COMPLETE), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["username"], "carol");

    let resp = send(&app, Method::GET, "/public/hello", Some(COMPLETE), None).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = send(&app, Method::GET, "/api/nowhere", Some(COMPLETE), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_setup_endpoint_reachable_while_incomplete() {
    let directory = seeded();
    let app = app_with(directory.clone());

    // PUT is exempt from the gate but not routed
    let resp = send(&app, Method::PUT, "/api/users/profile", Some(NEW_USER), None).await;
    assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);

    let resp = send(
        &app,
        Method::POST,
        "/api/users/profile",
        Some(NEW_USER),
        Some(json!({"username": "nina", "birthdate": "1990-01-01"})),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["email"], "new@x.com");

    // A repeat reaches the handler and fails on the duplicate check
    let resp = send(
        &app,
        Method::POST,
        "/api/users/profile",
        Some(NEW_USER),
        Some(json!({"username": "nina2", "birthdate": "1990-01-01"})),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.body["error"], "User with this external ID already exists.");

    let resp = send(&app, Method::GET, "/api/users/me", Some(NEW_USER), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["username"], "nina");
    assert_eq!(directory.count_users().unwrap(), 3);
}

#[tokio::test]
async fn test_incomplete_user_cannot_create_second_record() {
    let directory = seeded();
    let app = app_with(directory.clone());

    let resp = send(
        &app,
        Method::POST,
        "/api/users/profile",
        Some(INCOMPLETE),
        Some(json!({"username": "ian", "birthdate": "1990-01-01"})),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(directory.count_users().unwrap(), 2);
}

#[tokio::test]
async fn test_blank_username_is_bad_request() {
    let app = app_with(seeded());

    let resp = send(
        &app,
        Method::POST,
        "/api/users/profile",
        Some(NEW_USER),
        Some(json!({"username": "  ", "birthdate": "1990-01-01"})),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body, json!({"error": "Username must not be blank."}));
}

#[tokio::test]
async fn test_incomplete_profile_body_is_bad_request() {
    let directory = seeded();
    let app = app_with(directory.clone());

    for body in [json!({"username": "alice"}), json!({"birthdate": "1990-01-01"})] {
        let resp = send(&app, Method::POST, "/api/users/profile", Some(NEW_USER), Some(body)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert!(resp.body["error"].is_string());
    }

    let resp = send(
        &app,
        Method::POST,
        "/api/users/profile",
        Some(NEW_USER),
        Some(json!({"username": "alice", "birthdate": "not-a-date"})),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(directory.count_users().unwrap(), 2);
}

#[tokio::test]
async fn test_directory_outage_fails_closed() {
    let directory = seeded();
    let app = app_with(directory.clone());

    directory.fail_next("database is locked");
    let resp = send(&app, Method::GET, "/api/users/me", Some(COMPLETE), None).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.body, json!({"error": "Internal server error."}));
}

#[tokio::test]
async fn test_health_reports_directory_outage() {
    let directory = seeded();
    let app = app_with(directory.clone());

    directory.fail_next("database is locked");
    let resp = send(&app, Method::GET, "/actuator/health", None, None).await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.body["status"], "DOWN");
}
