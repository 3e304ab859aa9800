//! Route gating and project ownership over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{test_config, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn public_routes_need_no_token() {
    let app = TestApp::new().await;

    let res = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["checks"]["storage"], "up");

    let res = app
        .request(Method::GET, "/.well-known/openapi.json", None, None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["paths"]["/projects"].is_object());
}

#[tokio::test]
async fn protected_and_unknown_routes_require_token() {
    let app = TestApp::new().await;

    for (method, uri) in [
        (Method::GET, "/projects"),
        (Method::GET, "/users/me"),
        (Method::POST, "/auth/logout"),
        (Method::GET, "/admin/users"),
        (Method::GET, "/no-such-route"),
        (Method::GET, "/auth/login"),
    ] {
        let res = app.request(method.clone(), uri, None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }

    let res = app.get("/projects", "not-a-jwt").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_with_valid_token_is_not_found() {
    let app = TestApp::new().await;
    let token = app.register_and_token("alice@example.com").await;

    let res = app.get("/no-such-route", &token).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_has_full_access_to_tree() {
    let app = TestApp::new().await;
    let alice = app.register_and_token("alice@example.com").await;
    let (project, surface, asset) = app.seed_tree(&alice).await;

    let res = app.get("/projects", &alice).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = app.get(&format!("/projects/{}/surfaces", project), &alice).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = app.get(&format!("/surfaces/{}/assets", surface), &alice).await;
    assert_eq!(res.body[0]["id"], asset.as_str());

    let res = app
        .patch(
            &format!("/assets/{}", asset),
            &alice,
            json!({ "name": "www.example.com" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["name"], "www.example.com");

    let res = app.delete(&format!("/projects/{}", project), &alice).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    assert_eq!(
        app.get(&format!("/surfaces/{}", surface), &alice).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/assets/{}", asset), &alice).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn other_users_resources_are_forbidden() {
    let app = TestApp::new().await;
    let alice = app.register_and_token("alice@example.com").await;
    let bob = app.register_and_token("bob@example.com").await;
    let (project, surface, asset) = app.seed_tree(&alice).await;

    let res = app.get("/projects", &bob).await;
    assert_eq!(res.body, json!([]));

    for uri in [
        format!("/projects/{}", project),
        format!("/projects/{}/surfaces", project),
        format!("/surfaces/{}", surface),
        format!("/surfaces/{}/assets", surface),
        format!("/assets/{}", asset),
    ] {
        assert_eq!(app.get(&uri, &bob).await.status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let res = app
        .patch(&format!("/projects/{}", project), &bob, json!({ "name": "mine" }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post(
            &format!("/surfaces/{}/assets", surface),
            &bob,
            json!({ "name": "evil.example.com", "asset_type": "domain" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    assert_eq!(
        app.delete(&format!("/assets/{}", asset), &bob).await.status,
        StatusCode::FORBIDDEN
    );

    // Nothing changed for the owner
    let res = app.get(&format!("/projects/{}", project), &alice).await;
    assert_eq!(res.body["name"], "Perimeter");
    assert_eq!(
        app.get(&format!("/assets/{}", asset), &alice).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn missing_resources_are_not_found() {
    let app = TestApp::new().await;
    let alice = app.register_and_token("alice@example.com").await;
    let missing = Uuid::new_v4();

    for uri in [
        format!("/projects/{}", missing),
        format!("/surfaces/{}", missing),
        format!("/assets/{}", missing),
    ] {
        assert_eq!(app.get(&uri, &alice).await.status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn admin_sees_and_edits_everything() {
    let app = TestApp::new().await;
    let alice = app.register_and_token("alice@example.com").await;
    let (_, admin) = app.admin_token("admin@example.com").await;
    let (project, _, asset) = app.seed_tree(&alice).await;

    let res = app.get("/projects", &admin).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = app
        .patch(
            &format!("/assets/{}", asset),
            &admin,
            json!({ "description": "reviewed" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get(&format!("/projects/{}", project), &admin).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn moving_a_surface_requires_admin_and_owned_destination() {
    let app = TestApp::new().await;
    let alice = app.register_and_token("alice@example.com").await;
    let bob = app.register_and_token("bob@example.com").await;
    let (_, admin) = app.admin_token("admin@example.com").await;
    let (_, surface, _) = app.seed_tree(&alice).await;
    let (alice_second, _, _) = app.seed_tree(&alice).await;
    let (bob_project, _, _) = app.seed_tree(&bob).await;

    // Owners cannot re-parent by default
    let res = app
        .patch(
            &format!("/surfaces/{}", surface),
            &alice,
            json!({ "project_id": alice_second }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .patch(
            &format!("/surfaces/{}", surface),
            &admin,
            json!({ "project_id": bob_project }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["project_id"], bob_project.as_str());

    // Alice no longer owns it
    assert_eq!(
        app.get(&format!("/surfaces/{}", surface), &alice).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn owner_reparent_flag_allows_moves_between_own_projects() {
    let mut config = test_config();
    config.security.allow_owner_reparent = true;
    let app = TestApp::with_config(config).await;
    let alice = app.register_and_token("alice@example.com").await;
    let bob = app.register_and_token("bob@example.com").await;
    let (_, surface, asset) = app.seed_tree(&alice).await;
    let (_, second_surface, _) = app.seed_tree(&alice).await;
    let (bob_project, _, _) = app.seed_tree(&bob).await;

    let res = app
        .patch(
            &format!("/assets/{}", asset),
            &alice,
            json!({ "attack_surface_id": second_surface }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["attack_surface_id"], second_surface.as_str());

    let res = app
        .patch(
            &format!("/surfaces/{}", surface),
            &alice,
            json!({ "project_id": bob_project }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_rejects_unknown_fields() {
    let app = TestApp::new().await;
    let alice = app.register_and_token("alice@example.com").await;

    let res = app
        .post(
            "/projects",
            &alice,
            json!({ "name": "Perimeter", "owner_id": Uuid::new_v4() }),
        )
        .await;

    assert!(res.status.is_client_error());
    assert_eq!(app.get("/projects", &alice).await.body, json!([]));
}
