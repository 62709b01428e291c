use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use tagstore::api::routes::{create_router, AppState};
use tagstore::config::Config;
use tagstore::definition::StructuralValidator;
use tagstore::observability::{init_tracing, MetricsRegistry};
use tagstore::service::RuleEngineService;
use tagstore::storage;
use tagstore::store::TagStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting tagstore rule engine service"
    );

    // Open the datastore
    let datastore = storage::connect(&config).await?;
    info!(datastore = datastore.kind(), "Datastore ready");

    let store = TagStore::new(datastore.clone())
        .with_tx_timeout(config.tx_timeout());
    let service = RuleEngineService::new(
        store,
        Arc::new(StructuralValidator::new()),
        Arc::new(MetricsRegistry::new()),
    );

    // Create application state
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    // Cleanup
    info!("Shutting down...");
    if tokio::time::timeout(config.shutdown_timeout(), datastore.close())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Datastore did not close in time"
        );
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Received shutdown signal");
}
