//! staffing-server - Staffing and resource allocation dashboard backend
//!
//! Serves the JSON API and uploaded documents from a single SQLite database
//! kept in the root folder.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use staffing_common::config::{
    load_module_config, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use staffing_common::db::{init_database, seed_demo_data};
use staffing_server::{build_router, AppState};

const MODULE_NAME: &str = "staffing-server";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "staffing-server", version, about = "Staffing dashboard API server")]
struct Args {
    /// Root folder holding the database and uploads
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "STAFFING_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long)]
    bind: Option<String>,

    /// Load demo data if the database has no roles
    #[arg(long)]
    seed: bool,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    // Config errors are held back until the subscriber exists
    let (config, config_error) = match load_module_config(MODULE_NAME) {
        Ok(config) => (config, None),
        Err(e) => (TomlConfig::default(), Some(e)),
    };
    init_tracing(&config)?;
    if let Some(e) = config_error {
        warn!("Ignoring config file, using defaults: {}", e);
    }

    // Build identification first, before any database work
    info!(
        "Starting staffing-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let defaults = CompiledDefaults::for_current_platform();
    let root_folder = RootFolderResolver::from_config(MODULE_NAME, &config)
        .with_cli_arg(args.root_folder)
        .resolve();
    info!("Root folder: {}", root_folder.display());

    let initializer =
        RootFolderInitializer::new(root_folder).with_uploads_folder(config.uploads_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    if args.seed {
        if seed_demo_data(&pool).await.context("Failed to seed demo data")? {
            info!("Demo data loaded");
        } else {
            warn!("--seed ignored: database already contains roles");
        }
    }

    let threshold = config
        .over_allocation_threshold
        .unwrap_or(defaults.over_allocation_threshold);
    let max_upload_bytes = config.max_upload_bytes.unwrap_or(defaults.max_upload_bytes);
    let state = AppState::new(pool.clone(), initializer.uploads_path())
        .with_over_allocation_threshold(threshold)
        .with_max_upload_bytes(max_upload_bytes);
    let app = build_router(state);

    let port = args.port.or(config.port).unwrap_or(defaults.port);
    let bind = args
        .bind
        .or(config.bind_address)
        .unwrap_or(defaults.bind_address);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("staffing-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
