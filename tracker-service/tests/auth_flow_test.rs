//! Registration, login, token rotation and account administration over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn register_returns_user_and_token_pair() {
    let app = TestApp::new().await;

    let body = app.register("Alice@Example.COM").await;

    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn register_rejects_duplicate_email_case_insensitively() {
    let app = TestApp::new().await;
    app.register("alice@example.com").await;

    let res = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "ALICE@example.com", "password": PASSWORD })),
        )
        .await;

    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_short_password_and_bad_email() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "alice@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": PASSWORD })),
        )
        .await;
    assert!(res.status.is_client_error());
}

#[tokio::test]
async fn register_cannot_choose_role() {
    let app = TestApp::new().await;

    let res = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "mallory@example.com", "password": PASSWORD, "role": "admin" })),
        )
        .await;

    assert!(res.status.is_client_error());
    assert!(app
        .state
        .directory
        .find_by_email("mallory@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new().await;
    app.register("alice@example.com").await;

    let wrong_password = app.login("alice@example.com", "wrong-password").await;
    let unknown_email = app.login("nobody@example.com", PASSWORD).await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
}

#[tokio::test]
async fn refresh_rotates_and_old_token_is_rejected() {
    let app = TestApp::new().await;
    let registered = app.register("alice@example.com").await;
    let first = registered["refresh_token"].as_str().unwrap().to_string();

    let res = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": first })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let second = res.body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let replay = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": first })),
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    // The query parameter is accepted when there is no body
    let res = app
        .request(
            Method::POST,
            &format!("/auth/refresh?refresh_token={}", second),
            None,
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_token_is_bad_request() {
    let app = TestApp::new().await;

    let res = app
        .request(Method::POST, "/auth/refresh", None, Some(json!({})))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = TestApp::new().await;
    let access = app.register_and_token("alice@example.com").await;

    let res = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let registered = app.register("alice@example.com").await;
    let access = registered["access_token"].as_str().unwrap();
    let refresh = registered["refresh_token"].as_str().unwrap();

    let res = app.post("/auth/logout", access, json!({})).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_rejects_protected_fields() {
    let app = TestApp::new().await;
    let token = app.register_and_token("alice@example.com").await;

    for body in [
        json!({ "role": "admin" }),
        json!({ "is_active": false }),
        json!({ "password_hash": "x" }),
        json!({ "id": "00000000-0000-0000-0000-000000000000" }),
    ] {
        let res = app.patch("/users/me", &token, body.clone()).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "accepted {}", body);
    }

    let res = app.get("/users/me", &token).await;
    assert_eq!(res.body["role"], "user");
    assert_eq!(res.body["is_active"], true);
}

#[tokio::test]
async fn profile_update_changes_display_name() {
    let app = TestApp::new().await;
    let token = app.register_and_token("alice@example.com").await;

    let res = app
        .patch("/users/me", &token, json!({ "display_name": "Alice" }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["display_name"], "Alice");
}

#[tokio::test]
async fn profile_update_caps_display_name_length() {
    let app = TestApp::new().await;
    let token = app.register_and_token("alice@example.com").await;

    let res = app
        .patch("/users/me", &token, json!({ "display_name": "x".repeat(101) }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get("/users/me", &token).await;
    assert_eq!(res.body["display_name"], serde_json::Value::Null);
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let app = TestApp::new().await;
    let token = app.register_and_token("alice@example.com").await;

    let res = app
        .post(
            "/users/me/password",
            &token,
            json!({ "current_password": "wrong-password", "new_password": "another-long-one" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .post(
            "/users/me/password",
            &token,
            json!({ "current_password": PASSWORD, "new_password": "another-long-one" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    assert_eq!(
        app.login("alice@example.com", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("alice@example.com", "another-long-one").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn admin_routes_are_forbidden_for_users() {
    let app = TestApp::new().await;
    let token = app.register_and_token("alice@example.com").await;

    assert_eq!(app.get("/admin/users", &token).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_promote_and_deactivate() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin_token("admin@example.com").await;
    let registered = app.register("alice@example.com").await;
    let alice_id = registered["user"]["id"].as_str().unwrap().to_string();
    let alice_token = registered["access_token"].as_str().unwrap().to_string();
    let alice_refresh = registered["refresh_token"].as_str().unwrap().to_string();

    let res = app.get("/admin/users", &admin).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.as_array().unwrap().len(), 2);

    let res = app
        .patch(
            &format!("/admin/users/{}/role", alice_id),
            &admin,
            json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["role"], "admin");

    let res = app
        .patch(
            &format!("/admin/users/{}/status", alice_id),
            &admin,
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // A still-unexpired access token stops working once the account is inactive
    assert_eq!(
        app.get("/users/me", &alice_token).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("alice@example.com", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    let res = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": alice_refresh })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_delete_user_cascades_and_then_404s() {
    let app = TestApp::new().await;
    let (_, admin) = app.admin_token("admin@example.com").await;
    let registered = app.register("alice@example.com").await;
    let alice_id = registered["user"]["id"].as_str().unwrap().to_string();
    let alice_token = registered["access_token"].as_str().unwrap().to_string();
    let (project_id, _, _) = app.seed_tree(&alice_token).await;

    let res = app.delete(&format!("/admin/users/{}", alice_id), &admin).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.get(&format!("/projects/{}", project_id), &admin).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.delete(&format!("/admin/users/{}", alice_id), &admin).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
