//! triaged - support case triage daemon.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triaged::classify::HttpChatBackend;
use triaged::config::{TriagedConfig, CONFIG_PATH};
use triaged::server::{self, AppState};
use triaged::ticketing::HttpCaseStore;

#[derive(Parser, Debug)]
#[command(name = "triaged", version, about = "Support case triage daemon")]
struct Args {
    /// Path to the config file.
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the bind address from the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("triaged v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = TriagedConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }

    let store = Arc::new(HttpCaseStore::new(&config.ticketing)?);
    let backend = Arc::new(HttpChatBackend::new(&config.llm)?);

    let state = AppState::new(config, store, backend)?;
    server::run(state).await
}
