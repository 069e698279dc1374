//! Circular geofence zone and sample classification.

use std::fmt;

use thiserror::Error;

use crate::coord::{CoordError, Coordinate};

/// Errors raised when building a [`GeofenceZone`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ZoneError {
    /// Zone center is not a valid coordinate.
    #[error("Invalid zone center: {0}")]
    InvalidCenter(#[from] CoordError),

    /// Radius is zero, negative or not finite.
    #[error("Invalid zone radius: {0} (must be a positive number of meters)")]
    InvalidRadius(f64),
}

/// Whether a sample lies within the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    /// Distance to the center is at most the radius.
    Inside,
    /// Distance to the center exceeds the radius.
    Outside,
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proximity::Inside => write!(f, "inside"),
            Proximity::Outside => write!(f, "outside"),
        }
    }
}

/// Result of classifying one sample against a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Inside or outside.
    pub proximity: Proximity,
    /// Great-circle distance from the zone center in meters.
    pub distance_m: f64,
}

/// A circular geofence: a center and a radius in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceZone {
    center: Coordinate,
    radius_m: f64,
}

impl GeofenceZone {
    /// Create a zone, validating the center and radius.
    pub fn new(center: Coordinate, radius_m: f64) -> Result<Self, ZoneError> {
        center.validate()?;
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ZoneError::InvalidRadius(radius_m));
        }
        Ok(Self { center, radius_m })
    }

    /// Zone center.
    pub fn center(&self) -> Coordinate {
        self.center
    }

    /// Zone radius in meters.
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Classify a sample. The boundary is closed: a sample exactly
    /// `radius_m` from the center is inside.
    ///
    /// A NaN distance compares false and classifies as outside.
    pub fn classify(&self, sample: &Coordinate) -> Classification {
        let distance_m = self.center.distance_to(sample);
        let proximity = if distance_m <= self.radius_m {
            Proximity::Inside
        } else {
            Proximity::Outside
        };
        Classification {
            proximity,
            distance_m,
        }
    }

    /// Shorthand for `classify(sample).proximity == Proximity::Inside`.
    pub fn contains(&self, sample: &Coordinate) -> bool {
        self.classify(sample).proximity == Proximity::Inside
    }
}

impl fmt::Display for GeofenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} r={:.1}m", self.center, self.radius_m)
    }
}
