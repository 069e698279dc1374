//! Geofence CLI - Command-line interface
//!
//! This binary exposes the geofence library: distance checks, zone
//! classification, and replaying recorded tracks through the monitor.

mod commands;
mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::common::ZoneArgs;
use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "geofence",
    version,
    about = "Track enter, dwell and exit transitions for a circular geofence"
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/geofence/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Great-circle distance between two points
    Distance {
        #[arg(allow_hyphen_values = true)]
        lat1: f64,
        #[arg(allow_hyphen_values = true)]
        lon1: f64,
        #[arg(allow_hyphen_values = true)]
        lat2: f64,
        #[arg(allow_hyphen_values = true)]
        lon2: f64,
    },

    /// Check whether a fix lies inside the zone
    Check {
        #[arg(id = "fix_lat", value_name = "LAT", allow_hyphen_values = true)]
        lat: f64,
        #[arg(id = "fix_lon", value_name = "LON", allow_hyphen_values = true)]
        lon: f64,

        #[command(flatten)]
        zone: ZoneArgs,
    },

    /// Replay a recorded track and print status transitions
    Replay(ReplayArgs),

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => commands::distance::run(lat1, lon1, lat2, lon2),
        Commands::Check { lat, lon, zone } => commands::check::run(lat, lon, &zone, config),
        Commands::Replay(args) => commands::replay::run(args, config),
        Commands::Config { command } => commands::config::run(command, config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
