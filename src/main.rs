// Server entry point: parse flags, replay the AOF, then accept clients until Ctrl-C.
//
// RUST_LOG=debug cargo run -- --aof-path /tmp/appendonly.aof
// redis-cli set hello world
// redis-cli get hello

use anyhow::{Context, Result};
use aof_redis::{network, Aof, Config, Engine};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Single-node key-value server with an append-only log")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:6379")]
    addr: String,

    /// Path of the append-only file
    #[arg(long, default_value = "appendonly.aof")]
    aof_path: String,

    /// Milliseconds between forced flushes of the append-only file
    #[arg(long, default_value_t = 1000)]
    flush_interval_ms: u64,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config::builder()
            .addr(args.addr)
            .aof_path(args.aof_path)
            .flush_interval(Duration::from_millis(args.flush_interval_ms.max(1)))
            .build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config: Config = Args::parse().into();

    let engine = Engine::default();
    let aof = Aof::open(&config.aof_path, &engine)
        .await
        .with_context(|| format!("failed to load {}", config.aof_path.display()))?;
    let aof = Arc::new(aof);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let flusher = aof.spawn_flusher(config.flush_interval, async move {
        let _ = stop_rx.await;
    });

    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!("aof-redis is listening on {}", config.addr);

    // serve returns once every connection has closed, so the flusher's last
    // flush covers every acknowledged write
    let ret = network::serve(listener, engine, Arc::clone(&aof), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down");
    })
    .await;

    let _ = stop_tx.send(());
    flusher.await?;
    ret
}
