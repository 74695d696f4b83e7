//! Eventsource Server
//!
//! Run with: cargo run --bin eventsource -- --config config.toml
//!
//! Without `--config` the default locations are searched, then environment
//! variables (`EVENTSOURCE_*`) apply on top. `RUST_LOG` takes precedence over
//! the configured log level.

use clap::{Parser, Subcommand};
use eventsource::api::{serve, AppState};
use eventsource::config::{generate_default_config, Config, LogFormat, LoggingConfig};
use eventsource::stream::Stream;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "eventsource")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Server-Sent Events hub with broadcast and topic publish/subscribe")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (default)
    Serve,

    /// Print a default config file
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::PrintConfig) = cli.command {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.port {
        config.api.port = port;
    }

    init_logging(&config.logging);

    tracing::info!("Starting Eventsource v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        intake_capacity = config.stream.intake_capacity,
        delivery = ?config.stream.delivery,
        notify_topic_close = config.stream.notify_topic_close,
        "Stream configuration"
    );

    let stream = Arc::new(Stream::new(config.stream.clone()));
    stream.start().await?;

    let state = AppState::new(Arc::clone(&stream), config.api.clone());
    serve(state, &config.api).await?;

    let stats = stream.stats();
    tracing::info!(
        events = stats.events,
        delivered = stats.delivered,
        disconnected = stats.disconnected,
        "Eventsource stopped"
    );

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("eventsource={},tower_http=info", config.level).into());

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
