//! Netsync CLI
//!
//! Pushes network inventory from a discovery platform into a CMDB.
//!
//! # Commands
//!
//! - `sync` - Fetch, adapt and reconcile every enabled kind (default)
//! - `plan` - Same as `sync --dry-run`
//! - `init` - Write a template configuration file
//! - `show-config` - Print the effective configuration, credentials redacted

mod commands;
mod config_file;
mod logging;

use clap::{Args, Parser, Subcommand};
use config_file::DEFAULT_CONFIG_FILE;
use netsync_protocol::EntityKind;
use std::path::PathBuf;

/// Network inventory sync into NetBox.
#[derive(Parser)]
#[command(name = "netsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct SyncArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Only sync these kinds, ignoring the add_* flags (repeatable)
    #[arg(long)]
    only: Vec<EntityKind>,

    /// Compute the plan without changing the sink
    #[arg(long)]
    dry_run: bool,
}

impl Default for SyncArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
            only: Vec::new(),
            dry_run: false,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, adapt and reconcile every enabled kind
    Sync(SyncArgs),

    /// Show what sync would change without changing anything
    Plan(SyncArgs),

    /// Write a template configuration file
    Init {
        /// Where to write the file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration with credentials redacted
    ShowConfig {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Sync(SyncArgs::default())) {
        Commands::Sync(args) => {
            commands::sync::run(&args.config, &args.only, args.dry_run, cli.verbose)?;
        }
        Commands::Plan(args) => {
            commands::sync::run(&args.config, &args.only, true, cli.verbose)?;
        }
        Commands::Init { config, force } => {
            logging::init(cli.verbose);
            commands::init::run(&config, force)?;
        }
        Commands::ShowConfig { config } => {
            logging::init(cli.verbose);
            commands::show_config::run(&config)?;
        }
        Commands::Version => {
            println!("netsync v{}", env!("CARGO_PKG_VERSION"));
            println!("User-Agent: {}", netsync_engine::USER_AGENT);
        }
    }

    Ok(())
}
