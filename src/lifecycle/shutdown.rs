//! Stop signal shared between the signal handler and the HTTP server.

use tokio::sync::broadcast;

/// Fans one stop request out to every subscribed task.
///
/// The server passes a receiver to [`wait`] as its graceful-shutdown future;
/// tests trigger it directly instead of sending a signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request a stop. Repeated calls are harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Receivers that have not been dropped yet.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` sees the signal or its sender is gone.
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    // Lagged only happens after a send, which is itself the signal.
    let _ = rx.recv().await;
}
