//! Boundary between the processing loop and the owning application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::detection::{DetectedObject, RankCounts};

/// Update posted to the host's UI context.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// Normal status line
    Status(String),
    /// Recoverable failure; the loop keeps going
    Transient(String),
    /// Latest detections, for refreshing rank displays
    Detections(Vec<DetectedObject>),
    /// The stop condition was confirmed and the run should end
    StopConfirmed {
        objects: Vec<DetectedObject>,
        counts: RankCounts,
        reason: String,
    },
}

/// The owning application, as seen from the processing loop.
///
/// The loop never touches UI state directly: everything user-visible goes
/// through [`post`](RerollHost::post), which implementations marshal onto
/// their UI thread.
pub trait RerollHost: Send + Sync {
    /// Queue an update for the UI. Must not block.
    fn post(&self, update: UiUpdate);

    /// Whether a reroll run is currently in progress.
    fn is_running(&self) -> bool;

    /// Ask the application to end the current reroll run.
    fn request_stop(&self);
}

/// Host backed by a channel and a shared run flag.
///
/// Suits hosts that poll for updates on their own thread, like the CLI.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: Sender<UiUpdate>,
    running: Arc<AtomicBool>,
}

impl ChannelHost {
    /// Create a host whose run flag starts set.
    pub fn new(tx: Sender<UiUpdate>) -> Self {
        Self {
            tx,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared handle to the run flag.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl RerollHost for ChannelHost {
    fn post(&self, update: UiUpdate) {
        // A dropped receiver just means nobody is watching any more
        let _ = self.tx.send(update);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_host() {
        let (tx, rx) = mpsc::channel();
        let host = ChannelHost::new(tx);
        assert!(host.is_running());

        host.post(UiUpdate::Status("Rerolling".into()));
        assert_eq!(rx.recv().unwrap(), UiUpdate::Status("Rerolling".into()));

        let flag = host.running_flag();
        host.request_stop();
        assert!(!host.is_running());
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let host = ChannelHost::new(tx);
        host.post(UiUpdate::Transient("ignored".into()));
    }
}
