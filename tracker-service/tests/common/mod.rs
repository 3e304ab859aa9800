//! Shared setup for tracker-service integration tests.
//!
//! Every test gets its own in-memory store, so tests run in parallel without
//! a database.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use secrecy::Secret;
use serde_json::Value;
use service_core::config as core_config;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::util::ServiceExt;
use tracker_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, JwtConfig, SecurityConfig, StorageBackend, SwaggerConfig,
        SwaggerMode, TrackerConfig,
    },
    models::{Role, User},
    services::{InMemoryStore, NewUser, ResourceStore, UserStore},
    AppState,
};

pub const PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        common: core_config::Config::default(),
        environment: Environment::Dev,
        service_name: "tracker-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageBackend::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            access_secret: Secret::new("test-access-secret-0123456789abcdef".to_string()),
            refresh_secret: Secret::new("test-refresh-secret-0123456789abcdef".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_owner_reparent: false,
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        bootstrap_admin: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Status and parsed JSON body (`Value::Null` for an empty body).
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: TrackerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(
            config,
            store.clone() as Arc<dyn UserStore>,
            store as Arc<dyn ResourceStore>,
        );
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self { router, state }
    }

    /// Serve the router on a random local port and return its base URL.
    pub async fn spawn(&self) -> String {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().expect("No local address");
        let router = self.router.clone();

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        format!("http://{}", addr)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Register through the API; returns the registration response body.
    pub async fn register(&self, email: &str) -> Value {
        let res = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
        res.body
    }

    /// Register and return the access token.
    pub async fn register_and_token(&self, email: &str) -> String {
        self.register(email).await["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Create an admin directly in the store and log it in.
    pub async fn admin_token(&self, email: &str) -> (User, String) {
        let admin = self
            .state
            .directory
            .create(NewUser {
                email: email.to_string(),
                password: Secret::new(PASSWORD.to_string()),
                display_name: Some("Admin".to_string()),
                role: Role::Admin,
            })
            .await
            .expect("Failed to create admin");

        let res = self.login(email, PASSWORD).await;
        assert_eq!(res.status, StatusCode::OK);
        let token = res.body["access_token"].as_str().unwrap().to_string();
        (admin, token)
    }

    /// Create project -> surface -> asset owned by the token's user.
    pub async fn seed_tree(&self, token: &str) -> (String, String, String) {
        let project = self
            .post("/projects", token, serde_json::json!({ "name": "Perimeter" }))
            .await;
        assert_eq!(project.status, StatusCode::CREATED);
        let project_id = project.body["id"].as_str().unwrap().to_string();

        let surface = self
            .post(
                &format!("/projects/{}/surfaces", project_id),
                token,
                serde_json::json!({ "surface_type": "web_application" }),
            )
            .await;
        assert_eq!(surface.status, StatusCode::CREATED);
        let surface_id = surface.body["id"].as_str().unwrap().to_string();

        let asset = self
            .post(
                &format!("/surfaces/{}/assets", surface_id),
                token,
                serde_json::json!({ "name": "app.example.com", "asset_type": "domain" }),
            )
            .await;
        assert_eq!(asset.status, StatusCode::CREATED);
        let asset_id = asset.body["id"].as_str().unwrap().to_string();

        (project_id, surface_id, asset_id)
    }
}
