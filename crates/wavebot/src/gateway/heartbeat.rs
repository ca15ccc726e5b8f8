//! Periodic heartbeat task.
//!
//! Sleeps for the interval announced in HELLO, then queues a heartbeat
//! carrying the latest sequence number. Acknowledgements are not tracked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use wave_proto::Frame;

use crate::session::Session;

/// Handle for controlling the heartbeat task.
#[derive(Debug, Clone)]
pub struct HeartbeatHandle {
    running: Arc<AtomicBool>,
    beats_sent: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl HeartbeatHandle {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            beats_sent: Arc::new(AtomicU64::new(0)),
            cancel,
        }
    }

    /// Check if the heartbeat task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of heartbeats queued so far.
    #[must_use]
    pub fn beats_sent(&self) -> u64 {
        self.beats_sent.load(Ordering::SeqCst)
    }

    /// Stop the heartbeat task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Start a periodic heartbeat task.
///
/// The task reads the sequence from `session` at send time, so every beat
/// carries the most recent value. It stops when `cancel` fires or the
/// outbound channel closes.
pub fn start_heartbeat_task(
    interval: Duration,
    session: Arc<Session>,
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
) -> HeartbeatHandle {
    let handle = HeartbeatHandle::new(cancel.clone());
    handle.running.store(true, Ordering::SeqCst);

    let running = Arc::clone(&handle.running);
    let beats_sent = Arc::clone(&handle.beats_sent);

    tokio::spawn(async move {
        debug!(interval_ms = interval.as_millis(), "heartbeat started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            // Read the sequence only once the queue has room for the beat.
            let Ok(permit) = tx.reserve().await else {
                debug!("outbound channel closed, stopping heartbeat");
                break;
            };
            let sequence = session.sequence();
            permit.send(Frame::heartbeat(sequence));
            beats_sent.fetch_add(1, Ordering::SeqCst);
            trace!(?sequence, "heartbeat queued");
        }
        running.store(false, Ordering::SeqCst);
    });

    handle
}
