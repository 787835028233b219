//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        demo, AllowListIdentity, FileSessionStore, FsAttachmentStore, MemoryAttachmentStore,
        MemoryRecordStore, MemorySessionStore, PgRecordStore,
    },
    config::{AttachmentBackend, Config, ConfigError, RecordBackend},
    error::ApiError,
    web::{build_router, state::AppState},
};
use axum::http::HeaderValue;
use backoffice_core::ports::{AttachmentStore, RecordStore, SessionStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Record Store (and Migrations) ---
    let records: Arc<dyn RecordStore> = match &config.records {
        RecordBackend::Postgres { database_url } => {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = PgRecordStore::new(pool);
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(store)
        }
        RecordBackend::Memory => {
            info!("Using the in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    };

    // --- 3. Attachments, Session and Identity ---
    let attachments: Arc<dyn AttachmentStore> = match &config.attachments {
        AttachmentBackend::Filesystem { root } => {
            info!("Storing attachments under {}", root.display());
            Arc::new(FsAttachmentStore::new(root.clone()))
        }
        AttachmentBackend::Memory => Arc::new(MemoryAttachmentStore::new()),
    };
    let sessions: Arc<dyn SessionStore> = match &config.session_file {
        Some(path) => Arc::new(FileSessionStore::new(path.clone())),
        None => Arc::new(MemorySessionStore::new()),
    };
    let identity = Arc::new(AllowListIdentity::load(&config.allow_list_path).await?);

    if config.seed_demo_data {
        info!("Seeding demo data...");
        demo::seed(records.as_ref(), attachments.as_ref()).await?;
    }

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(records, attachments, sessions, identity));
    app_state.spawn_background_tasks();
    let shutdown = app_state.shutdown.clone();

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|_| {
        ConfigError::InvalidValue(
            "CORS_ORIGIN".to_string(),
            format!("'{}' is not a valid origin", config.cors_origin),
        )
    })?;
    let app = build_router(app_state, cors_origin);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling every login countdown and error timer first.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
