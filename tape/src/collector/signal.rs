//! One-shot completion signal shared between the collector loop and the
//! tasks waiting for a run to finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Fires once, wakes every waiter, stays fired.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CompletionSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `true` only for the call that actually
    /// flipped it; later calls are no-ops.
    pub fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::AcqRel);
        if first {
            self.token.cancel();
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once the signal has fired. Returns immediately if it
    /// already has.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fire_is_one_shot_and_wakes_all_waiters() {
        let signal = CompletionSignal::new();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let s = signal.clone();
                tokio::spawn(async move { s.wait().await })
            })
            .collect();

        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());

        for w in waiters {
            tokio::time::timeout(Duration::from_secs(1), w)
                .await
                .expect("waiter should wake")
                .expect("waiter task should not panic");
        }
    }

    #[tokio::test]
    async fn wait_after_fire_returns_immediately() {
        let signal = CompletionSignal::new();
        signal.fire();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("already fired");
    }
}
