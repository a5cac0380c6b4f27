use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_manager::maintenance::{start_reaper, PartitionManager};
use token_manager::storage::{
    Database, DistributedMutex, PartitionRepo, PgMutex, TokenRepo, UserRepo,
};
use token_manager::tokens::HmacCodec;
use token_manager::{api, config::Config, AppState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "token-manager starting");

    // Load configuration
    let config = Config::load()?;

    // Connect to storage and apply the schema
    let db = Arc::new(
        Database::connect(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_seconds),
        )
        .await?,
    );
    info!("Database connected and schema applied");

    // One signing key for the process lifetime, derived once here
    let codec = HmacCodec::new(&config.tokens.secret, config.tokens.entropy_bytes);

    // Each maintenance task gets its own named lock, so the reaper and the
    // partition growth manager never contend with each other
    let reaper_mutex: Arc<dyn DistributedMutex> =
        Arc::new(PgMutex::new(db.pool().clone(), "token-reaper"));
    let growth_mutex: Arc<dyn DistributedMutex> =
        Arc::new(PgMutex::new(db.pool().clone(), "user-partition-growth"));

    let catalog: Arc<dyn PartitionRepo> = db.clone();
    let store: Arc<dyn TokenRepo> = db.clone();
    let users: Arc<dyn UserRepo> = db;

    let partitions = Arc::new(PartitionManager::new(catalog, growth_mutex));

    let state = Arc::new(AppState {
        codec,
        config: config.clone(),
        partitions,
        store,
        users,
    });

    // Start the background reaper
    let reaper_handle = start_reaper(
        Arc::clone(&state.store),
        reaper_mutex,
        Duration::from_secs(config.tokens.reap_interval_seconds),
    );

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down background tasks");
    reaper_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
