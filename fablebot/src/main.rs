//! fablebot - build and play Inform 7 interactive fiction over chat.
//!
//! Architecture:
//! - The command router is the single entry point per inbound message and
//!   owns the author→session table
//! - Stories compile through the external Inform 7 → Inform 6 toolchain
//! - Play sessions run against a dumb-mode Frotz interpreter subprocess
//! - Author records persist to a JSON key-value store
//! - Messages arrive over an HTTP webhook; the chat network adapter proper
//!   lives outside this service

mod cli;
mod compile;
mod fetch;
mod models;
mod router;
mod server;
mod session;
mod store;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cli::Args;
use compile::Toolchain;
use router::Router;
use store::FileStore;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tools = Toolchain::resolve(&args.inform7, &args.inform6, &args.frotz, &args.internal)?;
    let store_path = args.store_path()?;
    let store = FileStore::open(&store_path)
        .with_context(|| format!("opening store at {}", store_path.display()))?;
    let router = Router::new(store, tools, Duration::from_millis(args.settle_ms));

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    server::run(listener, router).await
}
