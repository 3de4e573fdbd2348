use anyhow::{Context, Result};
use clap::Parser;
use mdsearch_core::KnowledgeBase;
use mdsearch_server::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Knowledge base database path
    #[arg(long, default_value = "knowledge_base.db")]
    db: String,
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
    let kb = KnowledgeBase::open(&args.db).with_context(|| format!("failed to open database {}", args.db))?;
    let stats = kb.stats();
    tracing::info!(db = %args.db, files = stats.file_count, chunks = stats.chunk_count, "knowledge base loaded");
    let app = build_app(Arc::new(kb));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
