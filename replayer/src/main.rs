use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replayer::{
    replay::{self, ReplayConfig, DEFAULT_DATASET, DEFAULT_ENDPOINT},
    viewer::{self, DEFAULT_DATA_URL},
};
use std::{io::IsTerminal, path::PathBuf, time::Duration};
use tokio_util::sync::CancellationToken;
use traffic_collector::TrafficRecord;
use url::Url;

/// Terminal color codes - empty strings if not outputting to terminal
fn get_colors() -> (&'static str, &'static str, &'static str, &'static str) {
    if std::io::stdout().is_terminal() {
        ("\x1b[90m", "\x1b[32m", "\x1b[31m", "\x1b[0m") // gray, green, red, reset
    } else {
        ("", "", "", "") // no colors when piped
    }
}

#[derive(Parser)]
#[command(name = "replayer")]
/// Replay geolocated traffic into a collector and inspect what it received
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send every dataset row to the collector, one per pace interval
    Replay(ReplayArgs),
    /// Poll the collector and print sources as they first appear
    Watch(WatchArgs),
    /// Print the sources with the most records
    Top(TopArgs),
}

#[derive(Parser)]
struct ReplayArgs {
    /// CSV with columns: ip address, Latitude, Longitude, Timestamp, suspicious
    #[arg(long, short, default_value = DEFAULT_DATASET)]
    dataset: PathBuf,

    /// Collector receive endpoint
    #[arg(long, short, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Seconds between consecutive rows
    #[arg(long, short, default_value_t = 1.0)]
    pace: f64,
}

#[derive(Parser)]
struct WatchArgs {
    /// Collector data endpoint
    #[arg(long, short, default_value = DEFAULT_DATA_URL)]
    url: String,

    /// Milliseconds between polls
    #[arg(long, default_value_t = 250)]
    interval_ms: u64,
}

#[derive(Parser)]
struct TopArgs {
    /// Collector data endpoint
    #[arg(long, short, default_value = DEFAULT_DATA_URL)]
    url: String,

    /// How many sources to list
    #[arg(long, short = 'n', default_value_t = 5)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "replayer=info".to_string()),
        )
        .init();

    let args = Args::parse();

    match &args.command {
        Commands::Replay(replay_args) => run_replay(replay_args).await,
        Commands::Watch(watch_args) => run_watch(watch_args).await,
        Commands::Top(top_args) => run_top(top_args).await,
    }
}

async fn run_replay(args: &ReplayArgs) -> Result<()> {
    let config = ReplayConfig::new(args.dataset.clone(), &args.endpoint)?
        .with_pace_seconds(args.pace)?;
    replay::run(&config).await?;
    Ok(())
}

async fn run_watch(args: &WatchArgs) -> Result<()> {
    let url = parse_url(&args.url)?;
    let client = reqwest::Client::new();

    // Stop polling on Ctrl+C
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let interval = Duration::from_millis(args.interval_ms);
    let sources = viewer::watch(&client, &url, interval, &cancel, print_arrival).await;

    tracing::info!(sources, "stopped watching");
    Ok(())
}

async fn run_top(args: &TopArgs) -> Result<()> {
    let url = parse_url(&args.url)?;
    let records = viewer::fetch_records(&reqwest::Client::new(), &url)
        .await
        .with_context(|| format!("failed to fetch {}", url))?;

    let top = viewer::top_locations(&records, args.limit);
    if top.is_empty() {
        eprintln!("No records received yet");
        return Ok(());
    }

    let (gray, green, red, reset) = get_colors();
    println!("Top Locations:");
    for location in top {
        let color = if location.suspicious { red } else { green };
        println!(
            "  {}{:<15}{}  {:>4}  {}{}{}",
            color,
            location.ip_address,
            reset,
            location.count,
            gray,
            format_coords(location.latitude, location.longitude),
            reset
        );
    }
    Ok(())
}

fn print_arrival(record: &TrafficRecord) {
    let (gray, green, red, reset) = get_colors();
    let color = if record.is_suspicious() { red } else { green };
    println!(
        "{}{:<15}{}  {}{}  {}{}",
        color,
        record.source(),
        reset,
        gray,
        format_coords(record.latitude, record.longitude),
        record.timestamp.as_deref().unwrap_or("-"),
        reset
    );
}

fn format_coords(latitude: Option<f64>, longitude: Option<f64>) -> String {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => format!("({:.4}, {:.4})", lat, lon),
        _ => "(unknown)".to_string(),
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).with_context(|| format!("invalid url: {}", url))
}
