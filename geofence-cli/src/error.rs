//! CLI error type.

use geofence::config::ConfigError;
use geofence::coord::CoordError;
use geofence::source::TrackError;
use geofence::GeofenceError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded, validated or saved.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A coordinate argument is out of range.
    #[error("{0}")]
    Coordinate(#[from] CoordError),

    /// The track file could not be read.
    #[error("{0}")]
    Track(#[from] TrackError),

    /// Processing a sample failed.
    #[error("{0}")]
    Geofence(#[from] GeofenceError),

    /// The Tokio runtime could not be created.
    #[error("Failed to create Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A background task panicked or was aborted.
    #[error("{0} task failed: {1}")]
    Task(&'static str, #[source] tokio::task::JoinError),

    /// A command refused to run with the given arguments.
    #[error("{0}")]
    Usage(String),
}
