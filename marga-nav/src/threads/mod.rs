//! Worker threads for MargaNav.
//!
//! - Ingest thread: TCP accept loop, frame decoding, acknowledgments
//! - Navigation thread: applies decoded events to the [`Navigator`]
//!
//! Events flow ingest -> navigation over an unbounded channel, so socket
//! reads never wait on route computation.

mod navigation;

pub use navigation::NavigationThread;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::ingest::{IngestEvent, IngestorHandle, WaypointIngestor};
use crate::navigator::Navigator;

/// Handles of the running worker threads.
pub struct ThreadHandles {
    pub ingest: IngestorHandle,
    pub navigation: JoinHandle<()>,
}

/// Bind the waypoint server and spawn both workers.
pub fn spawn_threads(
    server: &ServerConfig,
    navigator: Arc<Navigator>,
    shutdown: Arc<AtomicBool>,
) -> Result<ThreadHandles> {
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<IngestEvent>();

    let navigation = thread::Builder::new()
        .name("navigation".into())
        .spawn(move || NavigationThread::new(navigator, event_rx, shutdown).run())?;

    let ingest = WaypointIngestor::bind(server, event_tx)?.spawn()?;

    Ok(ThreadHandles { ingest, navigation })
}
