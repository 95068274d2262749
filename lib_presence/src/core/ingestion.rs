//! The single-consumer ingestion loop: drains the bounded snapshot channel
//! fed by the transport callback and runs parse -> aggregate -> change-check
//! -> publish for every inbound snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::core::change_detector::ChangeDetector;
use crate::core::engine::PresenceEngine;
use crate::core::watchdog::Watchdog;
use crate::model::PresenceSummary;

/// Outbound seam to the status feed. Implementations bound their own
/// acknowledgement wait and log-and-abandon on failure; the loop never
/// retries a publish, the next pass attempts again naturally.
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn publish(&self, summary: &PresenceSummary);
}

// Capacity 1 is enough: snapshots supersede each other, a backlog has no
// value.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 1;

/// Producer half handed to the transport callback.
#[derive(Clone)]
pub struct SnapshotSender {
    tx: mpsc::Sender<Vec<u8>>,
}

impl SnapshotSender {
    /// Never blocks the transport's thread: a full channel drops the payload
    /// with a diagnostic instead of applying backpressure.
    pub fn offer(&self, payload: Vec<u8>) {
        if self.tx.try_send(payload).is_err() {
            log::warn!("Snapshot channel full, dropping inbound snapshot");
        }
    }
}

/// The bounded hand-off between the transport callback and the loop.
pub fn snapshot_channel() -> (SnapshotSender, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
    (SnapshotSender { tx }, rx)
}

pub async fn run(
    engine: Arc<PresenceEngine>,
    mut snapshots: mpsc::Receiver<Vec<u8>>,
    mut detector: ChangeDetector,
    sink: Arc<dyn SummarySink>,
    watchdog: Watchdog,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Ingestion loop received shutdown signal.");
                break;
            }
            received = snapshots.recv() => {
                let Some(payload) = received else {
                    log::info!("Snapshot channel closed, stopping ingestion loop.");
                    break;
                };
                watchdog.ping();

                // A malformed snapshot skips the pass; the previous session
                // list and summary stay in place.
                let Some(sessions) = engine.parse_snapshot(&payload) else {
                    continue;
                };

                engine.replace_sessions(sessions);
                let summary = engine.aggregate(&engine.current_sessions());
                if detector.check(&summary) {
                    sink.publish(&summary).await;
                }
            }
        }
    }
}
