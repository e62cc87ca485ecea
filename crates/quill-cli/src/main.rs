//! Quill CLI - conditional text generation from the command line
//!
//! Runs batch generation over a prompt table or an interactive prompt loop,
//! and inspects model directories.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

mod commands;
mod config;
mod utils;

use commands::{generate::GenerateCommand, info::InfoCommand, Command};

#[derive(Parser)]
#[command(
    name = "quill",
    version = env!("CARGO_PKG_VERSION"),
    about = "Conditional text generation driver",
    long_about = "Generate continuations from a pretrained causal language model, either for every row of a prompt table or interactively."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    /// JSON output format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate text in batch or interactive mode
    #[command(name = "generate", alias = "gen", alias = "g")]
    Generate(GenerateCommand),

    /// Display model directory information
    #[command(name = "info", alias = "i")]
    Info(InfoCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    debug!("Quill CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load(cli.config.as_deref())?;
    debug!("Configuration loaded: {:?}", config);

    let result = match cli.command {
        Commands::Generate(cmd) => cmd.execute(&config, cli.json).await,
        Commands::Info(cmd) => cmd.execute(&config, cli.json).await,
    };

    match result {
        Ok(_) => {
            if !cli.quiet {
                info!("Command completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    // Logs go to stderr so the interactive console and JSON output stay clean.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
