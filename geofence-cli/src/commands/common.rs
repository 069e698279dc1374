//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use clap::Args;
use geofence::config::GeofenceConfig;

use crate::error::CliError;

/// Zone overrides accepted by commands that track a zone.
#[derive(Debug, Clone, Default, Args)]
pub struct ZoneArgs {
    /// Zone center latitude (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Zone center longitude (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Zone radius in meters (overrides config)
    #[arg(long)]
    pub radius: Option<f64>,
}

impl ZoneArgs {
    /// Apply the overrides to `config`.
    pub fn apply(&self, mut config: GeofenceConfig) -> GeofenceConfig {
        if let Some(lat) = self.lat {
            config.latitude = lat;
        }
        if let Some(lon) = self.lon {
            config.longitude = lon;
        }
        if let Some(radius) = self.radius {
            config.radius_m = radius;
        }
        config
    }
}

/// Resolve the config file path: explicit path first, then the default.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(GeofenceConfig::default_path()?),
    }
}

/// Load configuration.
///
/// An explicit path must exist. The default path is optional and falls back
/// to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<GeofenceConfig, CliError> {
    match explicit {
        Some(path) => Ok(GeofenceConfig::load(path)?),
        None => match GeofenceConfig::default_path() {
            Ok(path) => Ok(GeofenceConfig::load_or_default(&path)?),
            Err(_) => Ok(GeofenceConfig::default()),
        },
    }
}
