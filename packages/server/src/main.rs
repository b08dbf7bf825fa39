use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use snapvote_server::executor::TxExecutor;
use snapvote_server::governance::TallyPolicy;
use snapvote_server::hexutil::parse_address;
use snapvote_server::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "snapvote-server")]
#[command(about = "Snapshot-anchored token governance backend server")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Initial admin address (repeatable). At least one is required, since
    /// only admins can approve contracts.
    #[arg(long = "admin", env = "SNAPVOTE_ADMINS", value_delimiter = ',', required = true)]
    admins: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapvote_server=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let admins = cli
        .admins
        .iter()
        .map(|s| parse_address(s).with_context(|| format!("invalid admin address: {s}")))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(admins = admins.len(), "starting snapvote-server");

    let state = Arc::new(AppState::new(
        admins,
        TallyPolicy::SimpleMajority,
        TxExecutor::Unconfigured,
    ));

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
