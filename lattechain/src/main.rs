use anyhow::Result;
use clap::{Parser, Subcommand};

use lattechain::{commands, config, telemetry};

#[derive(Parser)]
#[command(name = "lattechain")]
#[command(about = "A redactable UTXO ledger with chameleon-hash transaction ids", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.lattechain/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config with preset genesis accounts
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Start the chain and answer commands from stdin
    Run {
        /// Enable mining even if the config disables it
        #[arg(long)]
        mine: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose)?;

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force),
        Commands::Run { mine } => commands::run::run(&config_path, mine),
    }
}
