//! Shelver REST API entry point.
//!
//! Parses CLI arguments, loads configuration, initializes services (resuming
//! any interrupted batches), and serves the HTTP surface.

mod http;
mod state;

use std::path::PathBuf;

use clap::Parser;

use state::AppState;

/// LLM-assisted directory organization service.
#[derive(Debug, Parser)]
#[command(name = "shelver", version, about)]
struct Cli {
    /// Path to config.toml.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address, overriding the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    shelver_observe::tracing_setup::init_tracing()
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let mut config = shelver_infra::config::load_config(&cli.config).await;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::init(config).await?;
    let router = http::router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "shelver listening");
    axum::serve(listener, router).await?;

    Ok(())
}
