//! # Souq API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  souq.toml + SOUQ_* ──► AppConfig                                       │
//! │                            │                                            │
//! │                            ▼                                            │
//! │  SQLite (migrated) ──► EngineContext ──► Engine ──► axum (8080)         │
//! │                            ▲                                            │
//! │  stored settings ──────────┘                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use souq_api::{build_app, AppConfig, AppState, HttpPaymentGateway};
use souq_db::{Database, DbConfig};
use souq_engine::{Engine, EngineContext, TracingActivityLogger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_target(true)
        .init();

    info!("Starting Souq API server...");

    let db = Database::new(
        DbConfig::new(config.database.path.clone()).max_connections(config.database.max_connections),
    )
    .await?;
    info!(path = %config.database.path.display(), "Database ready");

    let settings = {
        let mut conn = db.pool().acquire().await?;
        config.static_settings()?.with_stored_overrides(&mut conn).await?
    };
    info!(
        tax_rate_bps = settings.tax_rate.bps(),
        point_value = %settings.point_value,
        wallet_bonus_bps = settings.wallet_bonus_rate.bps(),
        "Settings loaded"
    );

    let gateway = HttpPaymentGateway::new(config.gateway.clone())?;
    let ctx = EngineContext::new(db.clone(), Arc::new(settings), Arc::new(TracingActivityLogger));
    let engine = Engine::new(ctx, Arc::new(gateway));
    let app = build_app(AppState::new(engine, db.clone()));

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error");
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

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
