//! Idle shutdown: stop the server once no preview client is left.
//!
//! At most one countdown is pending. Arming replaces the previous
//! countdown, so repeated arming never fires twice.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type Callback = Arc<dyn Fn() + Send + Sync>;

pub struct IdleShutdown {
    grace: Duration,
    on_idle: Callback,
    pending: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl IdleShutdown {
    /// Must be called from within the tokio runtime.
    pub fn new(grace: Duration, on_idle: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            grace,
            on_idle: Arc::new(on_idle),
            pending: Mutex::new(None),
            runtime: Handle::current(),
        }
    }

    /// Start the countdown, replacing any pending one.
    ///
    /// When it elapses the callback runs only if `still_idle()` holds.
    pub fn arm(&self, still_idle: impl Fn() -> bool + Send + 'static) {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let grace = self.grace;
        let on_idle = Arc::clone(&self.on_idle);
        crate::debug!("events"; "no subscribers, stopping in {}ms", grace.as_millis());
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if still_idle() {
                crate::log!("events"; "no preview clients left, shutting down");
                on_idle();
            }
        }));
    }

    /// Abort the pending countdown, if any.
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.abort();
            crate::debug!("events"; "idle shutdown cancelled");
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

impl Drop for IdleShutdown {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.abort();
        }
    }
}
