use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rewind_history::HistoryConfig;

mod counter;
mod script;
mod session;

/// Replays an edit script against a counter with grouped undo/redo history.
#[derive(Parser, Debug)]
#[command(name = "rewind", version, about)]
struct Cli {
    /// Script to replay, one command per line.
    script: PathBuf,

    /// History config file. Defaults to `REWIND_CONFIG` or the user config
    /// directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep at most this many operations per stack.
    #[arg(long = "max-operations")]
    max_operations: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(HistoryConfig::config_path);
    let mut config = HistoryConfig::load_or_create(&config_path);
    if let Some(max) = cli.max_operations {
        config.max_operations = Some(max);
        config.sanitize();
    }
    tracing::info!("Starting rewind with {config:?}");

    let source = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("Failed to read script: {}", cli.script.display()))?;
    let lines = script::parse_script(&source)
        .with_context(|| format!("Failed to parse script: {}", cli.script.display()))?;

    let session = session::Session::new(config);
    for text in session.run(&lines)? {
        println!("{text}");
    }
    println!("{}", session.status());
    tracing::debug!("Finished with value {}", session.value());

    Ok(())
}
