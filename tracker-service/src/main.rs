use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;
use tracker_service::{
    build_router,
    config::{BootstrapAdminConfig, StorageBackend, TrackerConfig},
    db,
    models::Role,
    services::{
        CredentialValidator, Database, InMemoryStore, NewUser, ResourceStore, UserDirectory,
        UserStore,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = TrackerConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        storage = ?config.storage,
        "Starting tracker service"
    );

    let (users, resources): (Arc<dyn UserStore>, Arc<dyn ResourceStore>) = match config.storage {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config.database)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            let database = Arc::new(Database::new(pool));
            (
                database.clone() as Arc<dyn UserStore>,
                database as Arc<dyn ResourceStore>,
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            let store = Arc::new(InMemoryStore::new());
            (
                store.clone() as Arc<dyn UserStore>,
                store as Arc<dyn ResourceStore>,
            )
        }
    };

    CredentialValidator::warm_up().await?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&UserDirectory::new(users.clone()), admin).await?;
    }

    let addr = config.common.listen_addr();
    let state = AppState::new(config, users, resources);
    let app = build_router(state).await?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Create the configured admin account unless that email already exists.
async fn bootstrap_admin(
    directory: &UserDirectory,
    admin: &BootstrapAdminConfig,
) -> Result<(), AppError> {
    if directory.find_by_email(&admin.email).await?.is_some() {
        tracing::info!("Bootstrap admin already present");
        return Ok(());
    }

    let user = directory
        .create(NewUser {
            email: admin.email.clone(),
            password: secrecy::Secret::new(admin.password.expose_secret().clone()),
            display_name: Some("Administrator".to_string()),
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = %user.id, "Bootstrap admin created");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
