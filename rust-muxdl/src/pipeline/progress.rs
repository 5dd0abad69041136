//! Process-wide broadcast of mux progress.
//!
//! One [`ProgressPublisher`] is created at startup and shared by every
//! request; subscribers come and go independently of any download. Delivery
//! is best effort: no replay for late subscribers and no buffering beyond
//! the channel capacity for slow ones.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast channel capacity.
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// Completion of a running mux, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "progress")]
    pub percent_complete: f64,
}

impl ProgressEvent {
    pub fn new(percent_complete: f64) -> Self {
        Self { percent_complete }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// Returns how many subscribers it reached; zero is not an error.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(percent = event.percent_complete, delivered, "Progress published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Events published from now on, as a stream that never ends while the
    /// publisher is alive. A subscriber that falls behind skips ahead.
    pub fn subscribe_stream(&self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(self.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!(skipped, "Progress subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_CAPACITY)
    }
}
