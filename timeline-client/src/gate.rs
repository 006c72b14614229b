//! Gates for holding a mocked call until a test releases it.
//!
//! Used by the in-memory collaborators to complete calls out of order.

use tokio::sync::oneshot;

/// Test-side handle of a held call.
#[derive(Debug)]
pub struct Gate {
    started: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

/// Collaborator-side half, consumed by the held call.
#[derive(Debug)]
pub(crate) struct HeldCall {
    started: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

impl Gate {
    pub(crate) fn pair() -> (Gate, HeldCall) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        (
            Gate {
                started: started_rx,
                release: release_tx,
            },
            HeldCall {
                started: started_tx,
                release: release_rx,
            },
        )
    }

    /// Wait until a call has picked up this gate.
    ///
    /// Returns `false` if the gate was dropped unused.
    pub async fn entered(&mut self) -> bool {
        (&mut self.started).await.is_ok()
    }

    /// Let the held call continue.
    pub fn release(self) {
        // The call may have been cancelled meanwhile
        let _ = self.release.send(());
    }
}

impl HeldCall {
    /// Signal entry and wait for release (or for the gate to be dropped).
    pub(crate) async fn wait(self) {
        let _ = self.started.send(());
        let _ = self.release.await;
    }
}
