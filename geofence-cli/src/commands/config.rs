//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init`.

use std::path::Path;

use clap::Subcommand;
use geofence::config::GeofenceConfig;

use super::common::{config_path, load_config};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as INI
    Show,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, explicit: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(explicit)?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", config_path(explicit)?.display());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(explicit, force),
    }
}

fn run_init(explicit: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config_path(explicit)?;
    if path.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    GeofenceConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
