// src/main.rs
//! nmea-tail - follow a GPS receiver's NMEA log and print decoded events

use clap::Parser;
use env_logger::{Builder, Target};
use log::{error, info};
use nmea_tail::{
    config::GpsConfig,
    display::{OutputFormat, TerminalSink},
    NmeaSession, NotifyBridge,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Debug, Parser)]
#[command(name = "nmea-tail", version, about = "Tail an NMEA-0183 log and print decoded events")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "nmea-tail.json")]
    config: PathBuf,

    /// Directory holding the tracked file (overrides the config)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Name of the tracked file (overrides the config)
    #[arg(short, long)]
    file: Option<String>,

    /// Emit JSON lines instead of coloured text
    #[arg(long)]
    json: bool,

    /// Also print every raw sentence
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut builder = Builder::from_default_env();
    builder
        .target(Target::Stderr)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::parse();

    let mut config = GpsConfig::load_from(&cli.config)?;
    if let Some(dir) = cli.dir {
        config.nmea_dir = dir;
    }
    if let Some(file) = cli.file {
        config.nmea_file = file;
    }

    let format = if cli.json { OutputFormat::Json } else { OutputFormat::Text };
    let sink = Arc::new(TerminalSink::stdout(format, cli.raw));
    let session = NmeaSession::from_config(config, Arc::new(NotifyBridge::new()), sink);

    info!("Tailing {}", session.path().display());
    session.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    session.stop()?;
    let joined = tokio::task::spawn_blocking(move || session.join()).await?;
    if let Err(e) = &joined {
        error!("Session ended with error: {}", e);
    }
    joined?;

    Ok(())
}
