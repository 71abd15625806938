use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use health_bridge_api::api::handlers::health::initialize_server_start_time;
use health_bridge_api::api::{create_application, AppState};
use health_bridge_api::config::AppConfig;
use health_bridge_domain::auth::token::TokenService;
use health_bridge_domain::crypto::FieldEncryptor;
use health_bridge_domain::database::initialize_database_pool_with;
use health_bridge_domain::health::HealthService;
use health_bridge_domain::services::{Services, SimulatedPaymentGateway};

/// How often expired entries are purged from the token revocation list
const BLACKLIST_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// The main entry point for the HealthBridge API server
///
/// Loads configuration, opens the database, seeds the first admin when asked
/// to, starts the sync worker and serves the router until Ctrl+C or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    // Initialize tracing for structured logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_ansi(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stdout),
        )
        .with(env_filter)
        .init();

    info!("Starting HealthBridge API server");

    let config = AppConfig::from_env().context("Invalid configuration")?;
    info!("Environment: {}", config.environment);

    // Create the data directory if it doesn't exist
    if !config.data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir.display());
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;
    }
    if let Some(parent) = Path::new(&config.database.sqlite_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }
    }

    // Initialize the global pool; auth event logging writes through it
    let pool = initialize_database_pool_with(&config.database).context("Failed to initialize database pool")?;
    info!("Database pool initialized successfully");

    let tokens = Arc::new(TokenService::new(config.tokens.clone()));
    let encryptor = FieldEncryptor::new(config.encryption.clone()).context("Invalid field encryption settings")?;

    let services = Services::new(
        pool.clone(),
        tokens.clone(),
        encryptor,
        Arc::new(SimulatedPaymentGateway::new()),
        config.services.clone(),
    );

    if let Some(seed) = &config.admin_seed {
        match services.users.ensure_admin_seed(&seed.email, &seed.password).await {
            Ok(Some(admin)) => info!("Created initial admin account {}", admin.email),
            Ok(None) => info!("Admin account already present, skipping seed"),
            Err(e) => error!("Failed to seed admin account: {}", e),
        }
    } else {
        warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set; no admin account will be seeded");
    }

    // Background tasks
    let sync_worker = services.sync.clone().spawn_worker();
    info!(
        "Sync worker started (every {}s, batch of {})",
        config.services.sync.interval_seconds, config.services.sync.batch_size
    );
    let blacklist_cleanup = tokens.blacklist().spawn_cleanup_task(BLACKLIST_CLEANUP_INTERVAL);

    // Initialize server start time for uptime reporting in health checks
    initialize_server_start_time();

    let state = AppState::new(services, tokens, Arc::new(HealthService::new(pool)));
    let app = create_application(state);

    let addr = config.socket_addr();
    info!("Listening on {}", addr);

    // Create a TCP listener and bind to the address
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve the application with graceful shutdown support
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sync_worker.abort();
    blacklist_cleanup.abort();

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
