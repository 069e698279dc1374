//! `geofence check`: classify a single fix against the configured zone.

use std::path::Path;

use geofence::coord::Coordinate;
use geofence::zone::Proximity;

use super::common::{load_config, ZoneArgs};
use crate::error::CliError;

/// Print the distance from the zone center and whether the fix is inside.
pub fn run(
    lat: f64,
    lon: f64,
    zone_args: &ZoneArgs,
    config: Option<&Path>,
) -> Result<(), CliError> {
    let sample = Coordinate::validated(lat, lon)?;
    let config = zone_args.apply(load_config(config)?);
    let zone = config.zone()?;

    let classification = zone.classify(&sample);
    let verdict = match classification.proximity {
        Proximity::Inside => "INSIDE",
        Proximity::Outside => "OUTSIDE",
    };

    println!("Zone:     {}", zone);
    println!("Fix:      {}", sample);
    println!("Distance: {:.1} m", classification.distance_m);
    println!("Result:   {}", verdict);
    Ok(())
}
