//! Cooperative cancellation for blocking dequeues.

use tokio::sync::watch;

/// Create a linked canceller/signal pair
pub fn cancellation() -> (Canceller, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancellationSignal { rx })
}

/// Fires the paired [`CancellationSignal`]s
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Cancel every clone of the paired signal
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal linked to this canceller
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observed by consumers between polling attempts
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancelled.
    ///
    /// Never completes if the canceller is dropped without firing.
    pub async fn cancelled(&mut self) {
        let canceller_dropped = self.rx.wait_for(|cancelled| *cancelled).await.is_err();
        if canceller_dropped {
            std::future::pending::<()>().await;
        }
    }
}
