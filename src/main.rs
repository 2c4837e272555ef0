//! CLI Entry Point for streamplt
//!
//! Runs a headless listener: subscribes to a ZeroMQ publisher, keeps the most
//! recent records in memory and logs a status line at a fixed interval until
//! Ctrl+C. Rendering is left to consumers of the library.
//!
//! # Usage
//!
//! ```bash
//! streamplt --address ipc:///tmp/stream --width 4
//! streamplt --config config/streamplt.toml --log-format json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::Serialized;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamplt::config::{AppConfig, DEFAULT_CONFIG_PATH};
use streamplt::tracing_init::{self, OutputFormat};
use streamplt::{DataListener, Record, ZmqTransport};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "streamplt")]
#[command(about = "Headless listener for delimited numeric streams", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Publisher endpoint (overrides listener.address)
    #[arg(long, short)]
    address: Option<String>,

    /// Number of values per message (overrides listener.buffer_width)
    #[arg(long, short)]
    width: Option<usize>,

    /// Number of retained records (overrides listener.buffer_length)
    #[arg(long, short)]
    length: Option<usize>,

    /// Log output format (overrides logging.format)
    #[arg(long, value_enum)]
    log_format: Option<OutputFormat>,
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut figment = AppConfig::figment(&self.config);
        if let Some(address) = &self.address {
            figment = figment.merge(Serialized::default("listener.address", address));
        }
        if let Some(width) = self.width {
            figment = figment.merge(Serialized::default("listener.buffer_width", width));
        }
        if let Some(length) = self.length {
            figment = figment.merge(Serialized::default("listener.buffer_length", length));
        }
        if let Some(format) = self.log_format {
            figment = figment.merge(Serialized::default("logging.format", format));
        }

        AppConfig::from_figment(figment)
            .with_context(|| format!("Failed to load configuration from {}", self.config.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    tracing_init::init_from_config(&config)?;

    println!("streamplt - headless stream listener");
    println!("   Address: {}", config.listener.address);
    println!(
        "   Record width: {}, buffer length: {}",
        config.listener.buffer_width, config.listener.buffer_length
    );
    println!();

    let listener = Arc::new(DataListener::new(
        ZmqTransport::new(),
        config.listener.clone(),
    )?);

    // `start` blocks until the subscription is established.
    let starter = Arc::clone(&listener);
    tokio::task::spawn_blocking(move || starter.start())
        .await?
        .with_context(|| format!("Failed to start listener on {}", config.listener.address))?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.monitor.interval_ms));

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => report(&listener),
        }

        if !listener.is_running() {
            warn!("Ingestion loop ended, shutting down");
            break;
        }
    }

    let stopper = Arc::clone(&listener);
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    Ok(())
}

fn report(listener: &DataListener) {
    let stats = listener.stats();
    let latest = listener.latest();
    info!(
        len = listener.len(),
        capacity = listener.config().buffer_length,
        received = stats.received,
        accepted = stats.accepted,
        dropped = stats.dropped(),
        lagged = stats.lagged,
        latest = ?latest.as_ref().map(Record::values),
        "Buffer status"
    );
}
