//! HTTP tests for `/auth/login`, `/auth/verify` and `/auth/refresh`.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use bankauth::{
    ServerConfig,
    auth::RolePermissions,
    cli::{ClientIpHeader, IpExtractor},
    create_app,
    db::{Database, UserRole},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tower::ServiceExt;

const TEST_IP: &str = "127.0.0.1";

struct TestApp {
    app: axum::Router,
    db: Database,
}

/// Create a test app that takes the client IP from `X-Forwarded-For`.
async fn create_test_app(access_token_ttl: u64, login_rate_per_minute: u32) -> TestApp {
    create_test_app_with_ip_extractor(
        access_token_ttl,
        login_rate_per_minute,
        Some(IpExtractor::from(ClientIpHeader::XForwardFor)),
    )
    .await
}

/// Create a test app backed by an in-memory database with two users:
/// alice (customer 2000, account 95470) and an admin.
async fn create_test_app_with_ip_extractor(
    access_token_ttl: u64,
    login_rate_per_minute: u32,
    ip_extractor: Option<IpExtractor>,
) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    db.users()
        .create("alice", "correct-pw", UserRole::User, Some("2000"))
        .await
        .unwrap();
    db.users().add_account("95470", "2000").await.unwrap();
    db.users()
        .create("admin", "admin-pw", UserRole::Admin, None)
        .await
        .unwrap();

    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: b"test-jwt-secret-of-reasonable-length".to_vec(),
        access_token_ttl,
        refresh_token_ttl: 24 * 60 * 60,
        permissions: RolePermissions::default(),
        login_rate_per_minute,
        ip_extractor,
    };

    TestApp {
        app: create_app(&config),
        db,
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", TEST_IP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &axum::Router, username: &str, password: &str) -> (String, String) {
    let (status, json) = send(
        app,
        post_json(
            "/auth/login",
            json!({ "username": username, "password": password }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", json);
    (
        json["access_token"].as_str().unwrap().to_string(),
        json["refresh_token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_login_success() {
    let TestApp { app, db } = create_test_app(3600, 30).await;

    let (access, refresh) = login(&app, "alice", "correct-pw").await;
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert!(db.tokens().exists(&refresh).await.unwrap());
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;

    let (status, json) = send(
        &app,
        post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "wrong" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid credentials");
}

#[tokio::test]
async fn test_verify_own_account() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;
    let (access, _) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        get(&format!(
            "/auth/verify?token={}&routeName=GetCustomer&customer_id=2000&account_id=95470",
            access
        )),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_authorized"], true);
}

#[tokio::test]
async fn test_verify_other_customer_forbidden() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;
    let (access, _) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        get(&format!(
            "/auth/verify?token={}&routeName=GetCustomer&customer_id=2001",
            access
        )),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "request not verified with the token claims");
}

#[tokio::test]
async fn test_verify_route_forbidden_for_user() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;
    let (access, _) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        get(&format!(
            "/auth/verify?token={}&routeName=GetAllCustomers",
            access
        )),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "user role is not authorized");
}

#[tokio::test]
async fn test_verify_admin_any_customer() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;
    let (access, _) = login(&app, "admin", "admin-pw").await;

    let (status, _) = send(
        &app,
        get(&format!(
            "/auth/verify?token={}&routeName=GetCustomer&customer_id=2001",
            access
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        get(&format!(
            "/auth/verify?token={}&routeName=GetAllCustomers",
            access
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_verify_missing_or_bad_token() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;

    let (status, json) = send(&app, get("/auth/verify?routeName=GetCustomer")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Invalid token");

    let (status, json) = send(&app, get("/auth/verify?token=abc&routeName=GetCustomer")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Invalid token");
}

#[tokio::test]
async fn test_refresh_before_expiry_forbidden() {
    let TestApp { app, .. } = create_test_app(3600, 30).await;
    let (access, refresh) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({ "access_token": access, "refresh_token": refresh }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json["error"],
        "cannot generate a new access token until the current one expires"
    );
}

#[tokio::test]
async fn test_refresh_after_expiry() {
    // Zero lifetime: every access token is expired as soon as it is issued
    let TestApp { app, .. } = create_test_app(0, 30).await;
    let (access, refresh) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        get(&format!(
            "/auth/verify?token={}&routeName=GetCustomer",
            access
        )),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Invalid token");

    let (status, json) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({ "access_token": access, "refresh_token": refresh }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let new_access = json["access_token"].as_str().unwrap();
    assert!(!new_access.is_empty());
    assert!(json.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_refresh_with_unknown_refresh_token() {
    let TestApp { app, .. } = create_test_app(0, 30).await;
    let (access, _) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({ "access_token": access, "refresh_token": "never-issued" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "refresh token not registered in the store");
}

#[tokio::test]
async fn test_refresh_with_invalid_access_token() {
    let TestApp { app, .. } = create_test_app(0, 30).await;
    let (_, refresh) = login(&app, "alice", "correct-pw").await;

    let (status, json) = send(
        &app,
        post_json(
            "/auth/refresh",
            json!({ "access_token": "forged", "refresh_token": refresh }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid token");
}

#[tokio::test]
async fn test_login_rate_limited_per_ip() {
    let TestApp { app, .. } = create_test_app(3600, 2).await;
    let body = json!({ "username": "alice", "password": "wrong" });

    for _ in 0..2 {
        let (status, _) = send(&app, post_json("/auth/login", body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = send(&app, post_json("/auth/login", body.clone())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Another client is unaffected
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "192.168.1.100")
        .body(Body::from(
            json!({ "username": "alice", "password": "correct-pw" }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_rate_limit_ignores_forwarded_for_without_ip_header() {
    let TestApp { app, .. } = create_test_app_with_ip_extractor(3600, 1, None).await;
    let peer: SocketAddr = "198.51.100.20:52000".parse().unwrap();

    let mut statuses = Vec::new();
    for i in 0..5 {
        let mut request = post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "wrong" }),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", format!("10.0.0.{}", i).parse().unwrap());
        request.extensions_mut().insert(ConnectInfo(peer));
        statuses.push(send(&app, request).await.0);
    }

    assert_eq!(statuses[0], StatusCode::UNAUTHORIZED);
    assert!(
        statuses[1..]
            .iter()
            .all(|status| *status == StatusCode::TOO_MANY_REQUESTS)
    );
}

#[tokio::test]
async fn test_login_without_client_ip_rejected() {
    let TestApp { app, .. } = create_test_app_with_ip_extractor(3600, 30, None).await;

    // No socket address and no configured header to fall back on
    let (status, _) = send(
        &app,
        post_json(
            "/auth/login",
            json!({ "username": "alice", "password": "correct-pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
