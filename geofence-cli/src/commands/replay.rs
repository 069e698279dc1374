//! `geofence replay`: feed a recorded track through the geofence monitor.
//!
//! By default fixes are replayed in real time at the configured cadence and
//! transitions are printed as they happen. With `--simulate` the track runs
//! on a virtual clock and finishes immediately.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Args;
use geofence::config::GeofenceConfig;
use geofence::sink::{StatusSink, TracingSink};
use geofence::source::{pump, simulate_track, TrackReplay};
use geofence::{GeofenceMonitor, StatusChangeEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{load_config, ZoneArgs};
use crate::error::CliError;

/// Arguments for `geofence replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Track file with one `latitude,longitude` pair per line
    pub track: PathBuf,

    /// Interval between fixes in milliseconds (defaults to config)
    #[arg(long)]
    pub cadence_ms: Option<u64>,

    /// Dwell delay in milliseconds (defaults to config)
    #[arg(long)]
    pub dwell_ms: Option<u64>,

    /// Time to keep watching after the last fix, in milliseconds
    /// (defaults to the dwell delay)
    #[arg(long)]
    pub linger_ms: Option<u64>,

    /// Run on a virtual clock instead of in real time
    #[arg(long)]
    pub simulate: bool,

    #[command(flatten)]
    pub zone: ZoneArgs,
}

/// Run the replay command.
pub fn run(args: ReplayArgs, config: Option<&Path>) -> Result<(), CliError> {
    let mut config = args.zone.apply(load_config(config)?);
    if let Some(ms) = args.dwell_ms {
        config = config.with_dwell_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.cadence_ms {
        if ms == 0 {
            return Err(CliError::Usage("--cadence-ms must be greater than zero".to_string()));
        }
        config = config.with_sample_interval(Duration::from_millis(ms));
    }
    let linger = args
        .linger_ms
        .map(Duration::from_millis)
        .unwrap_or(config.dwell_delay);

    let track = TrackReplay::load(&args.track)?.with_cadence(config.sample_interval);
    info!(
        track = %args.track.display(),
        fixes = track.remaining(),
        cadence_ms = config.sample_interval.as_millis() as u64,
        "Loaded track"
    );

    if args.simulate {
        run_simulated(track, &config, linger)
    } else {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;
        runtime.block_on(run_realtime(track, config, linger))
    }
}

fn run_simulated(
    track: TrackReplay,
    config: &GeofenceConfig,
    linger: Duration,
) -> Result<(), CliError> {
    let zone = config.zone()?;
    println!("Simulating track against {}", zone);

    let events = simulate_track(
        track,
        zone,
        config.dwell_delay,
        linger,
        Arc::new(TracingSink),
    )?;

    let Some(first) = events.first() else {
        println!("No transitions");
        return Ok(());
    };
    let origin = first.timestamp;
    for event in &events {
        let offset = event.timestamp.duration_since(origin);
        println!(
            "t+{:>8.3}s  {:<8}  {}",
            offset.as_secs_f64(),
            event.status.to_string(),
            event.status.description()
        );
    }
    Ok(())
}

async fn run_realtime(
    track: TrackReplay,
    config: GeofenceConfig,
    linger: Duration,
) -> Result<(), CliError> {
    let sink: Arc<dyn StatusSink> = Arc::new(TracingSink);
    let (monitor, handle) = GeofenceMonitor::new(&config, sink)?;
    println!("Watching {}", config.zone()?);

    let shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));
    let printer_task = tokio::spawn(print_events(handle.subscribe()));

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping replay");
            ctrl_c_shutdown.cancel();
        }
    });

    let stats = pump(track, &handle, shutdown.clone()).await;

    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(linger) => {}
    }

    shutdown.cancel();
    drop(handle);
    let monitor_result = monitor_task.await;
    if let Err(e) = printer_task.await {
        warn!(error = %e, "Status printer task failed");
    }
    monitor_result.map_err(|e| CliError::Task("Monitor", e))?;

    println!(
        "Replayed {} fixes ({} rejected)",
        stats.submitted, stats.rejected
    );
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<StatusChangeEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => println!(
                "{}  {:<8}  {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                event.status.to_string(),
                event.status.description()
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Status printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
