//! Init command - initialize configuration file.

use trainmap::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
pub fn run(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to point trainmap at your feed and backend.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
