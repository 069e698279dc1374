//! Geofence configuration.
//!
//! Configuration is read from an INI file. Every key is optional; missing
//! keys keep the defaults below.
//!
//! ```ini
//! [zone]
//! latitude = 37.5465
//! longitude = 126.9497
//! radius_m = 100
//!
//! [timing]
//! dwell_ms = 5000
//! sample_interval_ms = 500
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::coord::Coordinate;
use crate::machine::DEFAULT_DWELL_DELAY;
use crate::zone::{GeofenceZone, ZoneError};

/// Default zone center latitude.
pub const DEFAULT_LATITUDE: f64 = 37.5465;

/// Default zone center longitude.
pub const DEFAULT_LONGITUDE: f64 = 126.9497;

/// Default zone radius in meters.
pub const DEFAULT_RADIUS_M: f64 = 100.0;

/// Default interval between location fixes.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Default channel capacity for status-change subscribers.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

const ZONE_SECTION: &str = "zone";
const TIMING_SECTION: &str = "timing";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The configuration text is not valid INI.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A key holds a value of the wrong type.
    #[error("Invalid value for [{section}] {key}: {value:?}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    /// The configured zone is not valid.
    #[error("Invalid zone: {0}")]
    InvalidZone(#[from] ZoneError),

    /// The configuration file could not be written.
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No user configuration directory is available.
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Geofence configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceConfig {
    /// Zone center latitude in degrees.
    pub latitude: f64,
    /// Zone center longitude in degrees.
    pub longitude: f64,
    /// Zone radius in meters.
    pub radius_m: f64,
    /// Time inside before ENTERED is promoted to DWELLING.
    pub dwell_delay: Duration,
    /// Expected interval between location fixes.
    pub sample_interval: Duration,
    /// Buffer size of the status-change broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            radius_m: DEFAULT_RADIUS_M,
            dwell_delay: DEFAULT_DWELL_DELAY,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl GeofenceConfig {
    /// Default configuration file location: `<config dir>/geofence/config.ini`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("geofence").join("config.ini"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load configuration from an INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Load from `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(zone) = ini.section(Some(ZONE_SECTION)) {
            if let Some(v) = zone.get("latitude") {
                config.latitude = parse_value(ZONE_SECTION, "latitude", v)?;
            }
            if let Some(v) = zone.get("longitude") {
                config.longitude = parse_value(ZONE_SECTION, "longitude", v)?;
            }
            if let Some(v) = zone.get("radius_m") {
                config.radius_m = parse_value(ZONE_SECTION, "radius_m", v)?;
            }
        }

        if let Some(timing) = ini.section(Some(TIMING_SECTION)) {
            if let Some(v) = timing.get("dwell_ms") {
                config.dwell_delay =
                    Duration::from_millis(parse_value(TIMING_SECTION, "dwell_ms", v)?);
            }
            if let Some(v) = timing.get("sample_interval_ms") {
                let ms: u64 = parse_value(TIMING_SECTION, "sample_interval_ms", v)?;
                if ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: TIMING_SECTION,
                        key: "sample_interval_ms",
                        value: v.to_string(),
                    });
                }
                config.sample_interval = Duration::from_millis(ms);
            }
            if let Some(v) = timing.get("event_channel_capacity") {
                config.event_channel_capacity =
                    parse_value(TIMING_SECTION, "event_channel_capacity", v)?;
            }
        }

        Ok(config)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some(ZONE_SECTION))
            .set("latitude", self.latitude.to_string())
            .set("longitude", self.longitude.to_string())
            .set("radius_m", self.radius_m.to_string());
        ini.with_section(Some(TIMING_SECTION))
            .set("dwell_ms", self.dwell_delay.as_millis().to_string())
            .set(
                "sample_interval_ms",
                self.sample_interval.as_millis().to_string(),
            )
            .set(
                "event_channel_capacity",
                self.event_channel_capacity.to_string(),
            );

        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        let _ = ini.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Write as INI to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(write_err)
    }

    /// The configured zone, validated.
    pub fn zone(&self) -> Result<GeofenceZone, ConfigError> {
        let center = Coordinate::new(self.latitude, self.longitude);
        Ok(GeofenceZone::new(center, self.radius_m)?)
    }

    /// Set the zone center.
    pub fn with_center(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    /// Set the zone radius.
    pub fn with_radius_m(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Set the dwell delay.
    pub fn with_dwell_delay(mut self, dwell_delay: Duration) -> Self {
        self.dwell_delay = dwell_delay;
        self
    }

    /// Set the sample interval.
    pub fn with_sample_interval(mut self, sample_interval: Duration) -> Self {
        self.sample_interval = sample_interval;
        self
    }
}

fn parse_value<T: FromStr>(
    section: &'static str,
    key: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            section,
            key,
            value: value.to_string(),
        })
}
