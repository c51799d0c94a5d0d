mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_create_user_success() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/",
            None,
            Some(json!({ "email": "test@EXAMPLE.com", "password": PASSWORD, "name": "Test Name" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "email": "test@example.com", "name": "Test Name" }));
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let app = TestApp::new().await;
    app.create_user("dup@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/",
            None,
            Some(json!({ "email": "dup@example.com", "password": PASSWORD, "name": "Other" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());
}

#[tokio::test]
async fn test_password_too_short_creates_no_user() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/",
            None,
            Some(json!({ "email": "short@example.com", "password": "pw", "name": "Short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["password"].is_array());

    let found = recipe_backend::db::services::get_user_by_email(&app.db, "short@example.com")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_missing_fields_are_reported_per_field() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::POST, "/api/user/", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["email", "password", "name"] {
        assert_eq!(body[field], json!(["This field is required."]), "field {field}");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/user/")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_token_issued_for_valid_credentials() {
    let app = TestApp::new().await;
    app.create_user("token@example.com").await;

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/user/token/")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({ "email": "token@example.com", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_token_rejected_for_bad_credentials() {
    let app = TestApp::new().await;
    app.create_user("bad@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!({ "email": "bad@example.com", "password": "wrongpass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("token").is_none());
    assert_eq!(
        body["non_field_errors"],
        json!(["Unable to authenticate with provided credentials."])
    );

    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_token_rejected_for_blank_password() {
    let app = TestApp::new().await;
    app.create_user("blank@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!({ "email": "blank@example.com", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("token").is_none());
    assert_eq!(body["password"], json!(["This field may not be blank."]));
}

#[tokio::test]
async fn test_inactive_user_cannot_get_token_or_use_one() {
    let app = TestApp::new().await;
    let token = app.create_user("inactive@example.com").await;

    use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
    let user = recipe_backend::db::services::get_user_by_email(&app.db, "inactive@example.com")
        .await
        .unwrap()
        .unwrap();
    let mut active = user.into_active_model();
    active.is_active = Set(false);
    active.update(&app.db).await.unwrap();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!({ "email": "inactive@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.request(Method::GET, "/api/user/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let app = TestApp::new().await;
    let (status, _) = app.request(Method::GET, "/api/user/me/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request(Method::GET, "/api/user/me/", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_header_and_cookie_are_accepted() {
    let app = TestApp::new().await;
    let token = app.create_user("schemes@example.com").await;

    for (name, value) in [
        ("authorization", format!("Bearer {token}")),
        ("cookie", format!("token={token}")),
    ] {
        let request = axum::http::Request::builder()
            .uri("/api/user/me/")
            .header(name, value)
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK, "{name}");
        assert_eq!(body["email"], "schemes@example.com");
    }
}

#[tokio::test]
async fn test_retrieve_profile() {
    let app = TestApp::new().await;
    let token = app.create_user("me@example.com").await;

    let (status, body) = app.request(Method::GET, "/api/user/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "email": "me@example.com", "name": "Test User" }));
}

#[tokio::test]
async fn test_post_and_put_me_not_allowed() {
    let app = TestApp::new().await;
    let token = app.create_user("post@example.com").await;

    let (status, _) = app.request(Method::POST, "/api/user/me/", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = app.request(Method::PUT, "/api/user/me/", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_update_profile() {
    let app = TestApp::new().await;
    let token = app.create_user("update@example.com").await;

    let (status, body) = app
        .request(
            Method::PATCH,
            "/api/user/me/",
            Some(&token),
            Some(json!({ "name": "Updated Name", "password": "newpassword123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Updated Name");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!({ "email": "update@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/token/",
            None,
            Some(json!({ "email": "update@example.com", "password": "newpassword123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_update_profile_to_taken_email_fails() {
    let app = TestApp::new().await;
    app.create_user("taken@example.com").await;
    let token = app.create_user("mover@example.com").await;

    let (status, body) = app
        .request(
            Method::PATCH,
            "/api/user/me/",
            Some(&token),
            Some(json!({ "email": "taken@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));
}

#[tokio::test]
async fn test_superuser_is_staff_and_can_log_in() {
    let app = TestApp::new().await;
    let user = recipe_backend::services::auth_service::create_superuser(
        &app.db,
        &app.config,
        "admin@example.com".to_string(),
        PASSWORD.to_string(),
        "Admin".to_string(),
    )
    .await
    .unwrap();
    assert!(user.is_staff);
    assert!(user.is_active);

    let token = app.token_for("admin@example.com").await;
    let (status, body) = app.request(Method::GET, "/api/user/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Admin");
}
