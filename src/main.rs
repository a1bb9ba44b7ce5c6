mod app;
mod cli;
mod settings;
mod term;

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs::File, sync::Mutex};
use tracing::Level;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(&args)?;
    app::run(args)
}

// The terminal owns stdout/stderr while running, so logs only go to a file.
fn init_logging(args: &cli::Args) -> Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let level: Level = args
        .log_level
        .parse()
        .with_context(|| format!("unknown log level {:?}", args.log_level))?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();
    Ok(())
}
