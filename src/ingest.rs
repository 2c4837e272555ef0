//! The ingestion loop: receive, parse, validate, admit.
//!
//! Per-message failures never leave this module. A malformed payload or a
//! record of the wrong width is dropped with a `warn!` diagnostic and counted in
//! [`IngestStats`]; transient receive errors are counted and retried after
//! [`RECV_BACKOFF`], while a lagging subscription is counted and read again at
//! once. The loop ends when the stop signal fires, the transport reports the
//! subscription closed, or the transport fails with an unrecoverable error.

use crate::data::record::parse_record;
use crate::data::record_buffer::RecordBuffer;
use crate::error::{AppResult, StreamError};
use crate::transport::Subscription;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Pause after a failed receive before trying again.
pub const RECV_BACKOFF: Duration = Duration::from_millis(100);

/// Counters maintained by the ingestion loop.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    accepted: AtomicU64,
    invalid_width: AtomicU64,
    invalid_data: AtomicU64,
    evicted: AtomicU64,
    recv_errors: AtomicU64,
    lagged: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    /// Messages taken off the transport.
    pub received: u64,
    /// Records admitted into the buffer.
    pub accepted: u64,
    /// Messages that parsed but had the wrong number of fields.
    pub invalid_width: u64,
    /// Messages that failed to parse.
    pub invalid_data: u64,
    /// Records pushed out of the buffer by newer ones.
    pub evicted: u64,
    /// Transient transport receive failures.
    pub recv_errors: u64,
    /// Messages the transport discarded because the subscription fell behind.
    pub lagged: u64,
}

impl IngestStatsSnapshot {
    /// Messages whose outcome (admitted or dropped) is final.
    pub fn processed(&self) -> u64 {
        self.accepted + self.invalid_width + self.invalid_data
    }

    /// Messages dropped by parsing or validation.
    pub fn dropped(&self) -> u64 {
        self.invalid_width + self.invalid_data
    }
}

impl IngestStats {
    /// Read every counter.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            received: self.received.load(Ordering::Acquire),
            accepted: self.accepted.load(Ordering::Acquire),
            invalid_width: self.invalid_width.load(Ordering::Acquire),
            invalid_data: self.invalid_data.load(Ordering::Acquire),
            evicted: self.evicted.load(Ordering::Acquire),
            recv_errors: self.recv_errors.load(Ordering::Acquire),
            lagged: self.lagged.load(Ordering::Acquire),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Turn one raw message into a record and admit it into `buffer`.
///
/// Parsing happens before the buffer lock is taken; only the insertion itself
/// runs under the lock. Rejected messages are logged and counted, and the
/// rejection is returned so callers outside the loop can inspect it.
pub fn ingest_message(raw: &[u8], buffer: &RecordBuffer, stats: &IngestStats) -> AppResult<()> {
    IngestStats::bump(&stats.received);

    let admitted = parse_record(raw, buffer.width()).and_then(|record| buffer.insert(record));
    let evicted = match admitted {
        Ok(evicted) => evicted,
        Err(err) => {
            record_rejection(&err, stats);
            return Err(err);
        }
    };

    if evicted.is_some() {
        IngestStats::bump(&stats.evicted);
    }
    IngestStats::bump(&stats.accepted);
    trace!(len = buffer.len(), "Admitted record");

    Ok(())
}

/// Emit the diagnostic for a rejected message and count it.
fn record_rejection(err: &StreamError, stats: &IngestStats) {
    if let StreamError::InvalidWidth { expected, actual } = err {
        warn!(expected, actual, "Invalid record width");
        IngestStats::bump(&stats.invalid_width);
    } else if let StreamError::InvalidData { raw, reason } = err {
        warn!(raw = %raw, error = %reason, "Invalid data");
        IngestStats::bump(&stats.invalid_data);
    }
}

/// Drive `subscription` until `stop` is raised or the subscription closes.
pub(crate) async fn run(
    mut subscription: Box<dyn Subscription>,
    buffer: &RecordBuffer,
    stats: &IngestStats,
    mut stop: watch::Receiver<bool>,
) {
    info!(
        width = buffer.width(),
        capacity = buffer.capacity(),
        "Ingestion loop started"
    );

    loop {
        if *stop.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    debug!("Stop requested");
                    break;
                }
            }

            received = subscription.recv() => match received {
                // Rejections are already logged and counted.
                Ok(Some(raw)) => {
                    let _ = ingest_message(&raw, buffer, stats);
                }
                Ok(None) => {
                    info!("Subscription closed by transport");
                    break;
                }
                Err(StreamError::Lagged { skipped }) => {
                    stats.lagged.fetch_add(skipped, Ordering::AcqRel);
                    warn!(skipped, "Subscription lagged, messages dropped");
                }
                Err(err) if err.is_recoverable() => {
                    IngestStats::bump(&stats.recv_errors);
                    warn!(error = %err, "Receive failed, retrying");
                    if err.needs_backoff() {
                        tokio::select! {
                            _ = tokio::time::sleep(RECV_BACKOFF) => {}
                            _ = stop.changed() => {}
                        }
                    }
                }
                Err(err) => {
                    IngestStats::bump(&stats.recv_errors);
                    error!(error = %err, "Subscription failed");
                    break;
                }
            }
        }
    }

    let stats = stats.snapshot();
    info!(
        received = stats.received,
        accepted = stats.accepted,
        dropped = stats.dropped(),
        "Ingestion loop exited"
    );
}
