//! Cairn cell-info agent
//!
//! Offline driver for the cell-info pipeline.
//!
//! - `decode` prints the typed cell list of a raw parcel capture
//! - `replay` feeds a JSON scenario through tracker, arbiter and
//!   projector, printing every resulting bus signal
//!
//! The production transport and bus bindings live elsewhere; this binary
//! exists to exercise captures and scenarios without a modem.

mod replay;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cairn_cellinfo::config::CellInfoConfig;
use cairn_ril::decode::decode_cell_list;

/// Cairn cell-info offline driver.
#[derive(Parser, Debug)]
#[command(name = "cairn-agent", about = "Cairn cell-info offline driver")]
struct Cli {
    /// Pipeline configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Modem object path override.
    #[arg(long)]
    modem_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a raw cell-info parcel capture and print the cell list.
    Decode {
        /// Capture file containing one parcel.
        file: PathBuf,
    },
    /// Replay a JSON scenario through the full pipeline.
    Replay {
        /// Scenario file (JSON array of steps).
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CellInfoConfig::default(),
    };
    if let Some(modem_path) = cli.modem_path {
        config.modem_path = modem_path;
    }

    match cli.command {
        Command::Decode { file } => decode_capture(&file),
        Command::Replay { file } => replay::run(&file, &config),
    }
}

fn decode_capture(file: &Path) -> anyhow::Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("reading capture {}", file.display()))?;
    let cells = decode_cell_list(&mut &bytes[..]);
    tracing::info!(cells = cells.len(), bytes = bytes.len(), "capture decoded");
    println!("{}", serde_json::to_string_pretty(&cells)?);
    Ok(())
}
