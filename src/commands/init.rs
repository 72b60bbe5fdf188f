use anyhow::Result;

use crate::engine::config::EXAMPLE_CONFIG;
use crate::storage::FileStore;
use crate::util::atomic_write;

/// Write a starter configuration file
pub fn init(store: &FileStore, force: bool) -> Result<()> {
    let output_path = store.config_path();

    if output_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite",
            output_path.display()
        );
    }

    atomic_write(output_path, EXAMPLE_CONFIG.as_bytes())?;

    println!("✓ Created configuration file: {}", output_path.display());
    println!("\nEdit this file to configure schedules, budgets and override codes.");
    println!("See the comments in the file for the available options.");
    println!("\nThen start the daemon: site-warden run");

    Ok(())
}
