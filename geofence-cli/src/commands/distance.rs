//! `geofence distance`: great-circle distance between two points.

use geofence::coord::{haversine_distance, Coordinate};

use crate::error::CliError;

/// Print the haversine distance between two points in meters.
pub fn run(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<(), CliError> {
    let a = Coordinate::validated(lat1, lon1)?;
    let b = Coordinate::validated(lat2, lon2)?;

    let meters = haversine_distance(&a, &b);
    if meters >= 1000.0 {
        println!("{:.3} m ({:.3} km)", meters, meters / 1000.0);
    } else {
        println!("{:.3} m", meters);
    }
    Ok(())
}
