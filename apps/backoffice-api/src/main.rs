//! # Back-Office API Entry Point
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Application Startup                               │
//! │                                                                         │
//! │  1. Initialize Logging ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter                                │
//! │     • Default: info,pastificio=debug,sqlx=warn (override: RUST_LOG)     │
//! │                                                                         │
//! │  2. Load Configuration ───────────────────────────────────────────────► │
//! │     • defaults → backoffice.toml → PASTIFICIO_* environment             │
//! │     • --config <path> selects an explicit file                          │
//! │                                                                         │
//! │  3. Connect to Database ──────────────────────────────────────────────► │
//! │     • SQLite with WAL mode                                              │
//! │     • Run pending migrations                                            │
//! │                                                                         │
//! │  4. Serve ────────────────────────────────────────────────────────────► │
//! │     • axum on server.bind_addr:server.port                              │
//! │     • Graceful shutdown on Ctrl+C / SIGTERM                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backoffice_api::{app, AppState};
use pastificio_commerce::BackOfficeConfig;
use pastificio_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Pastificio back-office API");

    let config = BackOfficeConfig::load(config_path_arg())?;
    info!(
        db_path = ?config.database.path,
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );

    let db = Database::new(config.db_config()).await?;
    info!("Database connected and migrations applied");

    let state = AppState::new(db.clone(), &config);
    let listener = TcpListener::bind(config.server.bind_address()).await?;
    info!(addr = %config.server.bind_address(), "Back-office API listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=pastificio=trace` - Show trace for pastificio crates only
/// - Default: INFO, DEBUG for pastificio crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pastificio=debug,backoffice_api=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Reads `--config <path>` from the command line.
fn config_path_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
