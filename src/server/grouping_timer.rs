//! Resettable idle deadline for grouping instances
//!
//! Every reset cancels the pending deadline and schedules a new one. When a
//! deadline is reached its callback runs once. After [`GroupingTimer::stop`]
//! resets are ignored.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Idle window after which a grouping instance stops accepting deliveries
pub const GROUPING_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Pending {
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

#[derive(Debug)]
pub struct GroupingTimer {
    window: Duration,
    pending: Mutex<Pending>,
}

impl GroupingTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cancel any pending deadline and arm a new one that runs `on_fire`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn reset<F>(&self, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.stopped {
            return;
        }
        if let Some(task) = pending.task.take() {
            task.abort();
        }

        let window = self.window;
        pending.task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            tracing::debug!("Grouping window of {:?} elapsed", window);
            on_fire();
        }));
    }

    /// Cancel the pending deadline for good.
    pub fn stop(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.stopped = true;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stopped
    }
}
