use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Record store for Isles games and islands.
#[derive(Debug, Parser)]
#[command(name = "isles-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "ISLES_ADDR", default_value = "127.0.0.1:39333")]
    addr: SocketAddr,

    /// SQLite database file; defaults to ~/.isles/records.db.
    #[arg(long, env = "ISLES_DB")]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let db_path = args.db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".isles")
            .join("records.db")
    });

    isles_server::serve(args.addr, db_path, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    })
    .await
}
