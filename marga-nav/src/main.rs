//! MargaNav - parking structure navigation node
//!
//! Listens for waypoint assignments and live positions on TCP, tracks the
//! vehicle along its route and logs the resulting guidance.

use clap::Parser;
use marga_nav::{
    MargaConfig, NavigationSnapshot, NavigationUpdate, Navigator, Result, RoutingMode,
    spawn_threads,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;

const DEFAULT_CONFIG: &str = "marga.toml";

#[derive(Parser, Debug)]
#[command(name = "marga-nav", version)]
#[command(about = "Turn-by-turn guidance for a parking structure")]
struct Args {
    /// Configuration file (default: ./marga.toml when present)
    config: Option<PathBuf>,

    /// Listen address override
    #[arg(long)]
    bind: Option<String>,

    /// TCP port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Route building override
    #[arg(long, value_enum)]
    routing: Option<RoutingMode>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "marga_nav=info"
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();

    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()));
    let mut config = match &config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            MargaConfig::load(path)?
        }
        None => {
            info!("Using default configuration");
            MargaConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(mode) = args.routing {
        config.routing.mode = mode;
    }

    info!("MargaNav v{}", env!("CARGO_PKG_VERSION"));

    let base_dir = config_path.as_deref().and_then(Path::parent);
    let layout = config.load_facility(base_dir)?;
    let (update_tx, update_rx) = crossbeam_channel::unbounded::<NavigationUpdate>();
    let navigator = Arc::new(Navigator::from_config(&config, layout)?.with_updates(update_tx));
    info!("Routing mode: {:?}", navigator.routing_mode());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::Release);
    }) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handles = spawn_threads(&config.server, Arc::clone(&navigator), Arc::clone(&shutdown))?;
    info!("Waiting for waypoints on {}", handles.ingest.local_addr());

    // Main thread: present updates until interrupted
    let poll = Duration::from_millis(200);
    while running.load(Ordering::Acquire) {
        match update_rx.recv_timeout(poll) {
            Ok(NavigationUpdate::RouteChanged(snapshot)) => {
                info!(
                    "Route: {} points, {:?}, destination bay {:?}",
                    snapshot.route.len(),
                    snapshot.direction,
                    snapshot.destination_bay
                );
                present(&snapshot);
            }
            Ok(NavigationUpdate::PositionUpdated(snapshot)) => present(&snapshot),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        if !handles.ingest.is_running() || handles.navigation.is_finished() {
            warn!("A worker thread exited unexpectedly");
            break;
        }
    }

    info!("Shutting down...");
    let stats = handles.ingest.stats();
    handles.ingest.shutdown();
    shutdown.store(true, Ordering::Release);
    if handles.navigation.join().is_err() {
        error!("Navigation thread panicked");
    }

    info!(
        "Served {} connections: {} acknowledged, {} dropped, {} rejected",
        stats.connections, stats.acknowledged, stats.dropped, stats.rejected
    );
    info!("MargaNav finished");
    Ok(())
}

/// Log the driver display for one snapshot.
fn present(snapshot: &NavigationSnapshot) {
    let Some(guidance) = snapshot.guidance else {
        return;
    };

    let next = guidance
        .next
        .map(|m| format!(", then {}", m))
        .unwrap_or_default();
    info!(
        "{} in {:.1} m{} | {:.0}% | {} km/h",
        guidance.current,
        guidance.distance_m,
        next,
        snapshot.progress.unwrap_or(0.0),
        snapshot.speed_kmh
    );
}
