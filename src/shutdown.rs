//! Cancellation token passed into dispatch loops and background tasks.

use tokio::sync::watch;
use tracing::info;

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Raises the shutdown signal. Triggering more than once is harmless.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another receiver on the same signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Spawn a task that triggers on Ctrl-C (SIGINT).
    pub fn trigger_on_ctrl_c(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                self.trigger();
            }
            // Keep the sender alive so receivers don't see a closed channel
            // when the signal handler could not be installed.
            std::future::pending::<()>().await;
        })
    }
}

/// Observes the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered, or once every trigger is dropped.
    pub async fn wait(&mut self) {
        // Err means the sender is gone; treat that as shutdown too.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
