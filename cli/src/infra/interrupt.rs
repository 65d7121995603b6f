//! Infrastructure implementation of the `SafePoints` port, driven by Ctrl-C.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::ports::SafePoints;
use crate::domain::{Checkpoint, DeployError};

/// Cancellation flag shared between the signal listener and a transition.
#[derive(Clone)]
pub struct InterruptFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation at the next safe point.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Spawn a task that sets the flag on the first SIGINT.
    pub fn listen_for_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping at the next safe point");
                flag.trigger();
            }
        });
    }
}

impl SafePoints for InterruptFlag {
    fn reached(&self, point: Checkpoint) -> Result<(), DeployError> {
        if self.is_set() {
            return Err(DeployError::Cancelled(point));
        }
        debug!(%point, "safe point");
        Ok(())
    }

    async fn interrupted(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|set| *set).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
