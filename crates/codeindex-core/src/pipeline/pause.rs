//! Cooperative pause flag shared between a UI and a running refresh

use std::sync::Arc;
use tokio::sync::watch;

/// Level-triggered pause flag
///
/// Clones share one flag. Setting it twice is the same as setting it once;
/// waiters wake on the change to `false` instead of polling.
#[derive(Debug, Clone)]
pub struct PauseToken {
    tx: Arc<watch::Sender<bool>>,
}

impl PauseToken {
    pub fn new(paused: bool) -> Self {
        let (tx, _) = watch::channel(paused);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribers are only notified when the value actually changes
    pub fn set_paused(&self, paused: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != paused;
            *current = paused;
            changed
        });
    }

    /// Receiver that observes every later change of the flag
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves immediately when not paused, otherwise once unpaused
    pub async fn wait_until_resumed(&self) {
        if !self.is_paused() {
            return;
        }
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

impl Default for PauseToken {
    fn default() -> Self {
        Self::new(false)
    }
}
