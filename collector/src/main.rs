use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tokio::signal::unix::{signal, Signal, SignalKind};
use traffic_collector::{api, store::TrafficStore, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "collector")]
/// Accept traffic records over HTTP and serve them back as JSON
struct Args {
    /// Interface to bind (all interfaces by default)
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "collector=info,traffic_collector=info,tower_http=info".to_string()
        }))
        .init();

    let args = Args::parse();
    let addr = SocketAddr::new(args.host, args.port);

    let store = TrafficStore::new();
    let app = api::router(store.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "collector listening");

    // Stop accepting on SIGINT (Ctrl+C) or SIGTERM (systemd stop)
    let sigint = signal(SignalKind::interrupt())?;
    let sigterm = signal(SignalKind::terminate())?;

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(sigint, sigterm))
        .await?;

    let records = store.len().await;
    tracing::info!(records, "shutdown complete");
    Ok(())
}

async fn wait_for_shutdown(mut sigint: Signal, mut sigterm: Signal) {
    tokio::select! {
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down..."),
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down..."),
    }
}
