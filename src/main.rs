use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use ticketflow_api as api;
use api::config::StorageBackend;
use api::repositories::{InMemoryProcedureCatalog, InMemoryTicketStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::health::mark_started();

    let app_state = match cfg.storage_backend() {
        StorageBackend::Database => {
            let db_pool = api::db::establish_connection_from_app_config(&cfg)
                .await
                .context("failed to connect to database")?;
            api::db::check_connection(&db_pool)
                .await
                .context("database did not answer ping")?;
            if cfg.auto_migrate {
                api::db::run_migrations(&db_pool).await.map_err(|e| {
                    error!("Failed running migrations: {}", e);
                    e
                })?;
            }
            api::AppState::with_database(cfg.clone(), Arc::new(db_pool))
        }
        StorageBackend::InMemory => {
            warn!("Using in-memory storage; tickets are lost on restart");
            api::AppState::in_memory(
                cfg.clone(),
                InMemoryTicketStore::new(),
                InMemoryProcedureCatalog::new(),
            )
        }
    };

    let app = api::build_router(app_state);

    let ip = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address '{}'", cfg.host))?;
    let addr = SocketAddr::new(ip, cfg.port);
    info!("ticketflow-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ticketflow-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
    info!("shutdown signal received");
}
