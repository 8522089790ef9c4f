//! TCP server receiving waypoints and positions.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Listening -> Connected -> (Receiving <-> Dispatching) -> Closed -> Listening ...
//! ```
//!
//! One client at a time: the accept loop serves a connection to completion
//! with blocking reads before accepting the next. The listener itself is
//! polled non-blocking so the running flag is checked every 10ms.
//!
//! # Shutdown
//!
//! [`IngestorHandle::shutdown`] clears the running flag, half-closes and then
//! closes the active connection (which unblocks its read), and joins the
//! thread. There is no read timeout on the connection otherwise.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::framing::{FrameDecoder, split_concatenated};
use super::messages::{Acknowledgment, IngestEvent, classify};
use crate::config::ServerConfig;
use crate::error::{NavError, Result};

/// Accept loop poll interval
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Where the server is in its connection lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Listening = 0,
    Connected = 1,
    Receiving = 2,
    Dispatching = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Listening,
            1 => ConnectionState::Connected,
            2 => ConnectionState::Receiving,
            3 => ConnectionState::Dispatching,
            _ => ConnectionState::Closed,
        }
    }
}

/// Counters for the lifetime of the server
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Objects parsed and acknowledged
    pub acknowledged: u64,
    /// Objects dropped (oversized, bad UTF-8, bad JSON)
    pub dropped: u64,
    /// Acknowledged objects whose payload did not match their type
    pub rejected: u64,
    /// Events handed to the consumer
    pub dispatched: u64,
    /// Connections served
    pub connections: u64,
}

/// State shared between the accept thread and the handle
#[derive(Debug)]
struct Shared {
    running: AtomicBool,
    state: AtomicU8,
    active: Mutex<Option<TcpStream>>,
    acknowledged: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
    connections: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            state: AtomicU8::new(ConnectionState::Listening as u8),
            active: Mutex::new(None),
            acknowledged: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            connections: AtomicU64::new(0),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Bound but not yet running waypoint server
pub struct WaypointIngestor {
    listener: TcpListener,
    read_buffer: usize,
    max_frame_len: usize,
    events: Sender<IngestEvent>,
}

impl WaypointIngestor {
    /// Bind the listening socket. Events go to `events` in arrival order.
    pub fn bind(config: &ServerConfig, events: Sender<IngestEvent>) -> Result<Self> {
        let address = config.address();
        let listener = TcpListener::bind(&address).map_err(|e| {
            NavError::Connection(std::io::Error::new(
                e.kind(),
                format!("failed to bind {}: {}", address, e),
            ))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            read_buffer: config.read_buffer.max(1),
            max_frame_len: config.max_frame_len,
            events,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the accept loop on its own thread.
    pub fn spawn(self) -> Result<IngestorHandle> {
        let local_addr = self.local_addr()?;
        let shared = Arc::new(Shared::new());
        let thread_shared = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name("waypoint-ingest".into())
            .spawn(move || self.run(&thread_shared))?;

        info!("Waypoint server listening on {}", local_addr);

        Ok(IngestorHandle {
            local_addr,
            shared,
            thread: Some(thread),
        })
    }

    fn run(self, shared: &Shared) {
        while shared.is_running() {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        error!("Failed to set blocking mode for {}: {}", addr, e);
                        continue;
                    }
                    if !self.register(shared, &stream) {
                        let _ = stream.shutdown(Shutdown::Both);
                        break;
                    }

                    info!("Client connected: {}", addr);
                    shared.set_state(ConnectionState::Connected);
                    shared.connections.fetch_add(1, Ordering::Relaxed);

                    if let Err(e) = self.serve(shared, stream) {
                        warn!("Connection {} ended with error: {}", addr, e);
                    }

                    drop(shared.active.lock().take());
                    shared.set_state(ConnectionState::Closed);
                    info!("Client disconnected: {}", addr);

                    if shared.is_running() {
                        shared.set_state(ConnectionState::Listening);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionAborted
                            | ErrorKind::ConnectionReset
                            | ErrorKind::Interrupted
                            | ErrorKind::TimedOut
                    ) =>
                {
                    warn!("Transient accept error: {}", e);
                }
                Err(e) => {
                    error!("Listener failed, stopping waypoint server: {}", e);
                    break;
                }
            }
        }

        shared.set_state(ConnectionState::Closed);
        debug!("Waypoint server thread exiting");
    }

    /// Publish a clone of the stream so shutdown can unblock its reads.
    /// Returns false when shutdown already started.
    fn register(&self, shared: &Shared, stream: &TcpStream) -> bool {
        let mut active = shared.active.lock();
        if !shared.is_running() {
            return false;
        }
        match stream.try_clone() {
            Ok(clone) => *active = Some(clone),
            Err(e) => warn!("Cannot clone client stream, shutdown may wait for it: {}", e),
        }
        true
    }

    fn serve(&self, shared: &Shared, mut stream: TcpStream) -> Result<()> {
        let mut buf = vec![0u8; self.read_buffer];
        let mut decoder = FrameDecoder::new(self.max_frame_len);

        while shared.is_running() {
            shared.set_state(ConnectionState::Receiving);
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if !shared.is_running() => {
                    debug!("Read interrupted by shutdown: {}", e);
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let frames = decoder.push(&buf[..n]);
            if frames.is_empty() {
                continue;
            }

            shared.set_state(ConnectionState::Dispatching);
            for frame in frames {
                let text = match frame {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping frame: {}", e);
                        shared.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };
                self.handle_frame(shared, &mut stream, &text)?;
            }
        }

        if decoder.is_mid_frame() {
            debug!("Connection closed with a partial frame buffered");
        }
        Ok(())
    }

    /// Parse, dispatch and acknowledge one object.
    fn handle_frame(&self, shared: &Shared, stream: &mut TcpStream, text: &str) -> Result<()> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                let pieces = split_concatenated(text);
                if pieces.len() > 1 {
                    debug!("Splitting unparsable frame into {} objects", pieces.len());
                    for piece in pieces {
                        self.handle_frame(shared, stream, piece)?;
                    }
                    return Ok(());
                }
                warn!("Dropping unparsable frame ({}): {}", e, text);
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };

        match classify(value) {
            Ok(Some(event)) => {
                debug!(?event, "Dispatching");
                if self.events.send(event).is_err() {
                    warn!("Event consumer is gone, message discarded");
                } else {
                    shared.dispatched.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(None) => debug!("Ignoring message of unknown type: {}", text),
            Err(e) => {
                warn!("Rejecting message: {}", e);
                shared.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }

        stream.write_all(&Acknowledgment::received().to_bytes()?)?;
        shared.acknowledged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Running waypoint server. Dropping it shuts the server down.
pub struct IngestorHandle {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl IngestorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// False once shutdown started or the accept thread died
    pub fn is_running(&self) -> bool {
        self.shared.is_running() && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stats(&self) -> IngestStats {
        let s = &self.shared;
        IngestStats {
            acknowledged: s.acknowledged.load(Ordering::Relaxed),
            dropped: s.dropped.load(Ordering::Relaxed),
            rejected: s.rejected.load(Ordering::Relaxed),
            dispatched: s.dispatched.load(Ordering::Relaxed),
            connections: s.connections.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting, close the active connection and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        if let Some(stream) = self.shared.active.lock().take() {
            let _ = stream.shutdown(Shutdown::Write);
            let _ = stream.shutdown(Shutdown::Both);
        }

        if thread.join().is_err() {
            error!("Waypoint server thread panicked");
        }
        info!("Waypoint server stopped");
    }
}

impl Drop for IngestorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
