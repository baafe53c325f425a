//! Progress reporting capability.
//!
//! The orchestrator is variant-agnostic: the batch CLI injects a progress
//! bar, a service front end injects a channel sink feeding its push
//! connection, and library users get [`NoopSink`].

use serde::Serialize;
use tokio::sync::mpsc;

/// Fractional progress consumer for one pipeline run.
pub trait ProgressSink: Send + Sync {
    /// Called as tasks complete, with percent in `[0, 100]`.
    fn report(&self, percent: f64);
}

/// Discards all progress updates.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _percent: f64) {}
}

/// One progress message as pushed to a service client.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub progress: f64,
}

/// Forwards updates over an unbounded channel.
///
/// A dropped receiver is not an error; the pipeline outlives its observer.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, percent: f64) {
        let _ = self.tx.send(ProgressUpdate { progress: percent });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_forwards_updates() {
        let (sink, mut rx) = ChannelSink::new();
        sink.report(50.0);
        sink.report(100.0);

        assert_eq!(rx.recv().await.unwrap().progress, 50.0);
        assert_eq!(rx.recv().await.unwrap().progress, 100.0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_ignored() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.report(10.0);
    }

    #[test]
    fn update_serializes_to_progress_message() {
        let json = serde_json::to_string(&ProgressUpdate { progress: 42.0 }).unwrap();
        assert_eq!(json, r#"{"progress":42.0}"#);
    }
}
