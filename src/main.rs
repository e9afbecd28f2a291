use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};

use pdfbands::cli::{self, Cli};
use pdfbands::panic_handler;

fn init_logging(cli: &Cli) -> Result<()> {
    match &cli.log_file {
        Some(path) => WriteLogger::init(
            LevelFilter::Debug,
            Config::default(),
            File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?,
        )?,
        None => {
            let level = match cli.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            };
            TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            )?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    panic_handler::initialize_panic_handler();

    info!("Starting pdfbands {}", env!("CARGO_PKG_VERSION"));
    cli::run(cli)
}
