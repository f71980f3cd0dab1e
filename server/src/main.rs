use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use server::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};
use webindex_core::{Index, StoreConfig};

#[derive(Parser)]
struct Args {
    /// Store locator: memory, sled:<path> or redis://host:port/db (default: $INDEX_STORE or sled:./index)
    #[arg(long)]
    store: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = StoreConfig::resolve(args.store.as_deref())?;
    let store = config.open().with_context(|| format!("opening store {config}"))?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app: Router = build_app(Arc::new(Index::new(store)), admin_token);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, store = %config, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
