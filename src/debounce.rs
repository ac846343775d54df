//! Delay-then-fire-latest scheduling for bursty input.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Pending {
    /// Bumped on every schedule and cancel; a timer only fires if it still
    /// holds the current value.
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Runs only the most recently scheduled action, once its quiet period
/// has passed without another call to [`Debouncer::schedule`].
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Default)]
pub struct Debouncer {
    pending: Arc<Mutex<Pending>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending action with `action`, to run after `after`
    pub fn schedule<F>(&self, after: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }

        let generation = pending.generation;
        let shared = Arc::clone(&self.pending);
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            {
                let mut pending = shared.lock();
                if pending.generation != generation {
                    return;
                }
                // fired; nothing left to cancel
                pending.handle = None;
            }
            action.await;
        }));
    }

    /// Drop the pending action, if any. Nothing scheduled before this call
    /// fires afterwards.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock();
        pending.generation += 1;
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().handle.is_some()
    }
}
