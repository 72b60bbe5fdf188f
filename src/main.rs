use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod engine;
mod storage;
mod surface;
mod util;

/// Site Access Policy Engine
///
/// Decides whether access to a named site is permitted right now by
/// combining weekday/weekend schedules, weekly time budgets and
/// educational override grants, and tracks per-site usage as sessions
/// end.
#[derive(Parser, Debug)]
#[command(name = "site-warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the usage table
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Run the policy daemon (surface protocol on stdin/stdout)
    Run,
    /// Ask whether a site is blocked right now
    Check {
        /// Site or URL to check
        site: String,
    },
    /// Show weekly usage for all blocked sites
    Stats,
    /// Show the effective configuration and schedule state
    Status,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let store = storage::FileStore::resolve(args.config, args.data_dir)?;

    match args.command {
        Commands::Init { force } => commands::init::init(&store, force),
        Commands::Run => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::run::run(store))
        }
        Commands::Check { site } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::query::check(store, &site))
        }
        Commands::Stats => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::query::stats(store))
        }
        Commands::Status => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::query::status(store))
        }
    }
}

/// Initialize logging
///
/// Logs go to stderr so the daemon's surface protocol keeps stdout to
/// itself.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}
