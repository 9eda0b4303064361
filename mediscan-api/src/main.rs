//! mediscan-api - X-ray upload and analysis service
//!
//! `serve` (the default) runs the HTTP API. `issue-token` creates a user
//! if needed and prints a fresh bearer token for it.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mediscan_common::api::issue_token;
use mediscan_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use mediscan_common::db::init_database;
use mediscan_common::events::EventBus;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mediscan_api::services::{ModelBackend, ObjectStore};
use mediscan_api::{build_router, AnalysisSettings, AppState};

/// Buffered events per SSE subscriber before it starts lagging
const EVENT_BUS_CAPACITY: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "mediscan-api")]
#[command(about = "X-ray upload and AI diagnosis service")]
#[command(version)]
struct Cli {
    /// Root folder holding the database and stored images
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to <config_dir>/mediscan/mediscan.toml)
    #[arg(long, global = true, env = "MEDISCAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Print a new bearer token for a user, creating the user if needed
    IssueToken {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, origin) = TomlConfig::load_or_default(cli.config.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting mediscan-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    origin.log();

    let root_folder = RootFolderResolver::new("mediscan-api")
        .with_cli_arg(cli.root_folder.clone())
        .with_toml_root(config.root_folder.clone())
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        host: "127.0.0.1".to_string(),
    }) {
        Command::IssueToken { email } => {
            let (user, token) = issue_token(&db_pool, &email)
                .await
                .context("Failed to issue token")?;
            info!(user_id = %user.user_id, email = %user.email, "Issued API token");
            println!("{}", token);
            Ok(())
        }
        Command::Serve { port, host } => {
            let backend = ModelBackend::from_config(&config.analysis)
                .context("Failed to configure model backend")?;
            info!("Model backend: {}", backend.describe());

            let store = ObjectStore::new(initializer.storage_path());
            info!("Image storage: {}", store.root().display());

            let state = AppState::new(
                db_pool,
                EventBus::new(EVENT_BUS_CAPACITY),
                store,
                backend,
                AnalysisSettings::from_config(&config),
            );
            let app = build_router(state);

            let port = port.unwrap_or_else(|| config.port());
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;
            info!("Listening on http://{}", addr);
            info!("Health check: http://{}/health", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;

            info!("Server shutdown complete");
            Ok(())
        }
    }
}

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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
