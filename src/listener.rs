//! `DataListener`: the component a consumer holds.
//!
//! A listener wires an injected [`Transport`] to a [`RecordBuffer`]. `start`
//! connects and spawns exactly one ingestion thread; `get_snapshot` can be called
//! from any thread at any rate while ingestion runs; `stop` (or dropping the
//! listener) cancels the loop and joins the thread.
//!
//! # Example
//!
//! ```no_run
//! use streamplt::config::ListenerConfig;
//! use streamplt::listener::DataListener;
//! use streamplt::transport::ZmqTransport;
//!
//! # fn main() -> streamplt::error::AppResult<()> {
//! let config = ListenerConfig::new("ipc:///tmp/stream")
//!     .with_buffer_width(4)
//!     .with_buffer_length(1000);
//! let listener = DataListener::new(ZmqTransport::new(), config)?;
//! listener.start()?;
//!
//! for record in listener.get_snapshot() {
//!     println!("{:?}", record.values());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ListenerConfig;
use crate::data::record::Record;
use crate::data::record_buffer::RecordBuffer;
use crate::error::{AppResult, StreamError};
use crate::ingest::{self, IngestStats, IngestStatsSnapshot};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Name given to the ingestion thread.
pub const INGEST_THREAD_NAME: &str = "streamplt-ingest";

/// Lifecycle of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Constructed, `start` not yet called (or every attempt failed to connect).
    Idle,
    /// `start` is waiting for the subscription to be established.
    Starting,
    /// The ingestion loop is running.
    Running,
    /// The loop has exited, via `stop` or because the transport closed.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Started,
    Stopped,
}

/// Guarded by a mutex that is never held across connecting or joining.
struct Lifecycle {
    phase: Phase,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Lifecycle {
    fn reset(&mut self) {
        if self.phase == Phase::Starting {
            self.phase = Phase::Idle;
            self.stop_tx = None;
        }
    }
}

/// Background listener maintaining a bounded window of recent records.
pub struct DataListener {
    config: ListenerConfig,
    transport: Arc<dyn Transport>,
    buffer: Arc<RecordBuffer>,
    stats: Arc<IngestStats>,
    running: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

impl DataListener {
    /// Create a listener. Nothing is connected until [`DataListener::start`].
    pub fn new(transport: impl Transport, config: ListenerConfig) -> AppResult<Self> {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    /// Create a listener on a transport shared with other components.
    pub fn with_shared_transport(
        transport: Arc<dyn Transport>,
        config: ListenerConfig,
    ) -> AppResult<Self> {
        config.validate()?;
        let buffer = RecordBuffer::new(config.buffer_width, config.buffer_length)?;

        debug!(
            address = %config.address,
            transport = transport.name(),
            width = config.buffer_width,
            length = config.buffer_length,
            "Created data listener"
        );

        Ok(Self {
            config,
            transport,
            buffer: Arc::new(buffer),
            stats: Arc::new(IngestStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Idle,
                stop_tx: None,
                handle: None,
            }),
        })
    }

    /// Connect and spawn the ingestion loop.
    ///
    /// Blocks until the subscription is established, so connection failures are
    /// returned here. An endpoint that cannot be reached within
    /// [`ListenerConfig::connect_timeout`] fails with [`StreamError::Connection`].
    /// Calling `start` on a running (or starting) listener does nothing. A
    /// listener runs at most one loop: once stopped it cannot be started again.
    pub fn start(&self) -> AppResult<()> {
        let mut stop_rx = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.phase {
                Phase::Idle => {}
                Phase::Starting => {
                    debug!(address = %self.config.address, "Listener already starting");
                    return Ok(());
                }
                Phase::Started if self.running.load(Ordering::SeqCst) => {
                    debug!(address = %self.config.address, "Listener already running");
                    return Ok(());
                }
                Phase::Started | Phase::Stopped => return Err(StreamError::ListenerStopped),
            }
            let (stop_tx, stop_rx) = watch::channel(false);
            lifecycle.phase = Phase::Starting;
            lifecycle.stop_tx = Some(stop_tx);
            stop_rx
        };

        let (ready_tx, ready_rx) = mpsc::sync_channel::<AppResult<()>>(1);
        let transport = Arc::clone(&self.transport);
        let buffer = Arc::clone(&self.buffer);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let address = self.config.address.clone();
        let connect_timeout = self.config.connect_timeout();

        let spawned = thread::Builder::new()
            .name(INGEST_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(StreamError::Spawn(e)));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let connect =
                        tokio::time::timeout(connect_timeout, transport.subscribe(&address));
                    let connected = tokio::select! {
                        biased;

                        _ = stop_rx.changed() => Err(StreamError::ListenerStopped),
                        outcome = connect => match outcome {
                            Ok(subscribed) => subscribed,
                            Err(_) => Err(StreamError::Connection {
                                address: address.clone(),
                                message: format!(
                                    "no connection within {} ms",
                                    connect_timeout.as_millis()
                                ),
                            }),
                        },
                    };

                    let subscription = match connected {
                        Ok(subscription) => subscription,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                    running.store(true, Ordering::SeqCst);
                    let _ = ready_tx.send(Ok(()));

                    ingest::run(subscription, &buffer, &stats, stop_rx).await;
                    running.store(false, Ordering::SeqCst);
                });
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.lifecycle.lock().reset();
                return Err(StreamError::Spawn(e));
            }
        };

        let outcome = ready_rx.recv().unwrap_or_else(|_| {
            Err(StreamError::Spawn(std::io::Error::other(
                "ingestion thread exited before reporting readiness",
            )))
        });

        let mut lifecycle = self.lifecycle.lock();
        match outcome {
            Ok(()) if lifecycle.phase == Phase::Starting => {
                lifecycle.phase = Phase::Started;
                lifecycle.handle = Some(handle);
                info!(
                    address = %self.config.address,
                    transport = self.transport.name(),
                    "Started data listener"
                );
                Ok(())
            }
            // `stop` ran while connecting and has already raised the stop flag.
            Ok(()) => {
                drop(lifecycle);
                Self::join(handle);
                Err(StreamError::ListenerStopped)
            }
            Err(e) => {
                lifecycle.reset();
                drop(lifecycle);
                Self::join(handle);
                error!(address = %self.config.address, error = %e, "Failed to start data listener");
                Err(e)
            }
        }
    }

    /// Signal the ingestion loop to stop and wait for its thread to exit.
    ///
    /// Idempotent. Stopping a listener that was never started does nothing.
    /// Stopping a listener that is still connecting aborts the connection and
    /// makes the pending `start` return [`StreamError::ListenerStopped`].
    pub fn stop(&self) {
        let (stop_tx, handle) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.phase == Phase::Idle {
                return;
            }
            lifecycle.phase = Phase::Stopped;
            (lifecycle.stop_tx.take(), lifecycle.handle.take())
        };

        if let Some(stop_tx) = stop_tx {
            let _ = stop_tx.send(true);
        }

        if let Some(handle) = handle {
            Self::join(handle);

            let stats = self.stats.snapshot();
            info!(
                address = %self.config.address,
                received = stats.received,
                accepted = stats.accepted,
                dropped = stats.dropped(),
                "Stopped data listener"
            );
        }
    }

    fn join(handle: JoinHandle<()>) {
        if let Err(e) = handle.join() {
            error!("Ingestion thread panicked: {:?}", e);
        }
    }

    /// Independent copy of the buffered records, most recent first.
    pub fn get_snapshot(&self) -> Vec<Record> {
        self.buffer.snapshot()
    }

    /// Copy of the most recent record, if any.
    pub fn latest(&self) -> Option<Record> {
        self.buffer.latest()
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true when no record is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns true while the ingestion loop runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        match self.lifecycle.lock().phase {
            Phase::Idle => ListenerState::Idle,
            Phase::Starting => ListenerState::Starting,
            Phase::Started if self.is_running() => ListenerState::Running,
            Phase::Started | Phase::Stopped => ListenerState::Stopped,
        }
    }

    /// Ingestion counters.
    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// The configuration this listener was built from.
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Endpoint the listener subscribes to.
    pub fn address(&self) -> &str {
        &self.config.address
    }
}

impl Drop for DataListener {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DataListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataListener")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .field("len", &self.buffer.len())
            .field("running", &self.is_running())
            .finish()
    }
}
