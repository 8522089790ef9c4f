//! Navigation thread: applies ingested events to the navigator in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::ingest::IngestEvent;
use crate::navigator::Navigator;

/// How long a receive waits before the shutdown flag is checked again
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Navigation thread state and logic.
pub struct NavigationThread {
    navigator: Arc<Navigator>,
    events: Receiver<IngestEvent>,
    shutdown: Arc<AtomicBool>,
    handled: u64,
    failed: u64,
}

impl NavigationThread {
    pub fn new(
        navigator: Arc<Navigator>,
        events: Receiver<IngestEvent>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            navigator,
            events,
            shutdown,
            handled: 0,
            failed: 0,
        }
    }

    /// Run until shutdown is signalled or every sender is gone.
    pub fn run(&mut self) {
        tracing::info!("Navigation thread started");

        while !self.shutdown.load(Ordering::Acquire) {
            match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Event source closed");
                    break;
                }
            }
        }

        tracing::info!(
            "Navigation thread exiting ({} events handled, {} rejected)",
            self.handled,
            self.failed
        );
    }

    fn handle(&mut self, event: IngestEvent) {
        match self.navigator.handle(event) {
            Ok(snapshot) => {
                self.handled += 1;
                tracing::trace!(
                    segment = ?snapshot.segment,
                    progress = ?snapshot.progress,
                    "Event applied"
                );
            }
            Err(e) => {
                self.failed += 1;
                tracing::warn!("Event rejected: {}", e);
            }
        }
    }
}
