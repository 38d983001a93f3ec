use std::sync::Arc;

use cideldill_manager::Manager;
use cideldill_server::cli::Cli;
use cideldill_server::{port_discovery, router, AppState};
use cideldill_store::{CidStore, SqliteStore};
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Error)]
enum StartupError {
    #[error("object store error: {0}")]
    Store(#[from] cideldill_store::StoreError),
    #[error("failed to bind listener: {0}")]
    Bind(std::io::Error),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("mcp adapter error: {0}")]
    Mcp(#[from] cideldill_mcp::McpError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    std::process::exit(match run(cli).await {
        Ok(()) => 0,
        Err(source) => {
            tracing::error!(%source, "server failed to start");
            1
        }
    });
}

fn init_tracing(cli: &Cli) {
    // `--mcp-stdio` reserves stdout for the JSON-RPC transport; logs go to stderr either way.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let store: Arc<dyn CidStore> = Arc::new(open_store(&cli)?);
    let manager = Arc::new(Manager::new());

    if cli.mcp_stdio {
        tracing::info!("starting MCP stdio adapter");
        return cideldill_mcp::McpServer::new(manager, store).run().await.map_err(StartupError::from);
    }

    let state = AppState::new(manager, store);
    let app = router(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(StartupError::Bind)?;
    let bound_port = listener.local_addr().map_err(StartupError::Bind)?.port();
    port_discovery::write_port(bound_port);
    tracing::info!(host = %cli.host, port = bound_port, "cideldill-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn open_store(cli: &Cli) -> Result<SqliteStore, cideldill_store::StoreError> {
    if cli.memory {
        return SqliteStore::open_in_memory();
    }
    match &cli.db {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open_in_memory(),
    }
}

async fn shutdown_signal() {
    if let Err(source) = tokio::signal::ctrl_c().await {
        tracing::warn!(%source, "failed to install ctrl-c handler");
    }
    tracing::info!("received shutdown signal");
}
