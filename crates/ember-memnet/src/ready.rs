//! One-shot readiness signalling.

use std::sync::Arc;

use tokio::sync::watch;

/// A one-shot readiness event.
///
/// Fires at most once. Any number of tasks may wait on it concurrently,
/// and waiting after it has fired returns immediately. Cloning yields
/// another handle to the same event.
#[derive(Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Returns `true` on the first call, `false` if the
    /// signal had already fired.
    pub fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Whether the signal has fired.
    pub fn fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close mid-wait.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}
