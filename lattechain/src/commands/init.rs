use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Run the init command
pub fn run(config_path: &Path, force: bool) -> Result<()> {
    if Config::exists(config_path) && !force {
        bail!(
            "Config already exists at {}\nUse a different --config path or pass --force to overwrite it.",
            config_path.display()
        );
    }

    let config = Config::default();
    config.save(config_path)?;

    info!("Config initialized at {}", config_path.display());
    println!("Config saved to: {}", config_path.display());
    println!("\nGenesis accounts:");
    for account in &config.accounts {
        println!("  {:<12} {}", account.name, account.balance);
    }
    println!("\nNext steps:");
    println!("  1. Edit the accounts and mining settings if needed");
    println!("  2. Run 'lattechain run' and type 'help' for commands");

    Ok(())
}
