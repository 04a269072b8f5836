//! Trait abstraction for the telemetry transport to enable testing

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Sample;

/// Maximum number of samples delivered as the initial backlog batch.
pub const DEFAULT_BACKLOG_LIMIT: usize = 60;

/// An item delivered on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One or more samples, in arrival order
    Batch(Vec<Sample>),
    /// Transport-level read error; the subscription stays open
    Error(String),
}

/// Source of per-device sample streams.
///
/// Contract for implementors:
/// - the first batch is the backlog (most recent samples, chronologically
///   sorted), sent only when non-empty
/// - later batches carry samples newer than anything in the backlog
/// - nothing is delivered after [`Subscription::unsubscribe`]
pub trait TelemetrySource: Send + Sync {
    /// Starts streaming samples for `device_id`. Registration does not block.
    fn subscribe(&self, device_id: &str) -> Subscription;
}

/// Handle to an active stream.
///
/// Events are read one at a time in the order the source produced them.
/// Dropping the handle cancels the stream as well.
pub struct Subscription {
    device_id: String,
    events: mpsc::Receiver<StreamEvent>,
    feeder: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Wraps a receiver fed by `feeder`. The feeder task is aborted on cancel.
    pub fn new(
        device_id: impl Into<String>,
        events: mpsc::Receiver<StreamEvent>,
        feeder: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            events,
            feeder,
        }
    }

    /// Device this subscription streams from
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Waits for the next event. `None` once the source has finished.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Cancels the stream.
    ///
    /// Consumes the handle, so no event can be observed afterwards.
    pub fn unsubscribe(mut self) {
        info!("Stopping data stream for device: {}", self.device_id);
        self.cancel();
    }

    fn cancel(&mut self) {
        self.events.close();
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.feeder.is_some() {
            debug!("Subscription for {} dropped without unsubscribe", self.device_id);
        }
        self.cancel();
    }
}

/// Picks the initial backlog from a device's stored samples.
///
/// Orders by timestamp and keeps the most recent `limit` entries. The sort is
/// stable, so samples sharing a timestamp keep their stored order.
///
/// # Examples
///
/// ```
/// use tachometer_monitor::telemetry::{select_backlog, Sample};
///
/// let stored = vec![Sample::new(30, 3.0), Sample::new(10, 1.0), Sample::new(20, 2.0)];
/// let backlog = select_backlog(&stored, 2);
/// assert_eq!(backlog, vec![Sample::new(20, 2.0), Sample::new(30, 3.0)]);
/// ```
#[must_use]
pub fn select_backlog(stored: &[Sample], limit: usize) -> Vec<Sample> {
    let mut sorted = stored.to_vec();
    sorted.sort_by_key(|s| s.timestamp);
    let skip = sorted.len().saturating_sub(limit);
    sorted.split_off(skip)
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock telemetry source for testing.
    ///
    /// Each `subscribe` opens a fresh channel; tests push into the most recent one.
    #[derive(Clone, Default)]
    pub struct ManualTelemetry {
        pub senders: Arc<Mutex<Vec<mpsc::Sender<StreamEvent>>>>,
        pub subscribed: Arc<Mutex<Vec<String>>>,
    }

    impl ManualTelemetry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn subscription_count(&self) -> usize {
            self.subscribed.lock().unwrap().len()
        }

        fn latest(&self) -> mpsc::Sender<StreamEvent> {
            self.senders
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("no active subscription")
        }

        /// Pushes a batch; returns false if the subscriber is gone.
        pub async fn push(&self, batch: Vec<Sample>) -> bool {
            self.latest().send(StreamEvent::Batch(batch)).await.is_ok()
        }

        pub async fn fail(&self, message: &str) -> bool {
            self.latest()
                .send(StreamEvent::Error(message.to_string()))
                .await
                .is_ok()
        }

        pub fn is_closed(&self) -> bool {
            self.latest().is_closed()
        }
    }

    impl TelemetrySource for ManualTelemetry {
        fn subscribe(&self, device_id: &str) -> Subscription {
            let (tx, rx) = mpsc::channel(64);
            self.senders.lock().unwrap().push(tx);
            self.subscribed.lock().unwrap().push(device_id.to_string());
            Subscription::new(device_id, rx, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_limited_to_most_recent() {
        let stored: Vec<Sample> = (0..100).map(|i| Sample::new(i, i as f64)).collect();
        let backlog = select_backlog(&stored, DEFAULT_BACKLOG_LIMIT);
        assert_eq!(backlog.len(), 60);
        assert_eq!(backlog.first().unwrap().timestamp, 40);
        assert_eq!(backlog.last().unwrap().timestamp, 99);
    }

    #[test]
    fn test_backlog_sorted_chronologically() {
        let stored = vec![Sample::new(5, 0.0), Sample::new(1, 0.0), Sample::new(3, 0.0)];
        let ts: Vec<i64> = select_backlog(&stored, 10).iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![1, 3, 5]);
    }

    #[test]
    fn test_backlog_empty() {
        assert!(select_backlog(&[], 60).is_empty());
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let mut sub = Subscription::new("dev", rx, None);
        tx.send(StreamEvent::Batch(vec![Sample::new(1, 1.0)])).await.unwrap();
        tx.send(StreamEvent::Error("read failed".into())).await.unwrap();
        drop(tx);

        assert_eq!(sub.next_event().await, Some(StreamEvent::Batch(vec![Sample::new(1, 1.0)])));
        assert_eq!(sub.next_event().await, Some(StreamEvent::Error("read failed".into())));
        assert_eq!(sub.next_event().await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_channel_and_aborts_feeder() {
        let (tx, rx) = mpsc::channel::<StreamEvent>(8);
        let feeder_tx = tx.clone();
        let feeder = tokio::spawn(async move {
            loop {
                if feeder_tx.send(StreamEvent::Batch(vec![])).await.is_err() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        });
        let sub = Subscription::new("dev", rx, Some(feeder));
        assert_eq!(sub.device_id(), "dev");

        sub.unsubscribe();
        assert!(tx.is_closed());
    }
}
