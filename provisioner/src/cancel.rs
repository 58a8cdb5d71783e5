//! Run-scoped cancellation signal
//!
//! Every blocking operation of a provisioning run (remote command, readiness
//! poll tick, collaborator call) observes the same token, so an operator
//! interrupt aborts promptly and surfaces as a distinct error category.

use tokio::sync::watch;

/// Sending half, held by the front end and wired to SIGINT/SIGTERM.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Observing half, cloned into the provisioning context.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked cancellation pair.
pub fn cancel_channel() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelToken { rx })
}

impl CancelSource {
    /// Cancel the run. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run is cancelled; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Source dropped without cancelling; this run can no longer
                // be interrupted.
                std::future::pending::<()>().await;
            }
        }
    }

    /// A token that never fires. Useful for tests and standalone contexts.
    pub fn inert() -> CancelToken {
        let (_tx, rx) = watch::channel(false);
        CancelToken { rx }
    }
}
