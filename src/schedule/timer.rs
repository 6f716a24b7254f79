//! Cancelable scheduled events.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A callback scheduled to run once after a delay.
///
/// Cancelling or dropping the handle prevents the callback from running.
/// Runs on the tokio timer, so paused-clock tests can advance it.
#[derive(Debug)]
pub struct ScheduledEvent {
    handle: JoinHandle<()>,
}

impl ScheduledEvent {
    /// Run `f` after `delay` on the current runtime.
    ///
    /// Returns `None` when called outside a Tokio runtime.
    pub fn after<F>(delay: Duration, f: F) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = Handle::try_current().ok()?;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        Some(Self { handle })
    }

    /// Cancel the event if it has not fired yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledEvent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let _event = ScheduledEvent::after(Duration::from_millis(900), move || {
            f.store(true, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(899)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop() {
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let event = ScheduledEvent::after(Duration::from_millis(100), move || {
            f.store(true, Ordering::SeqCst);
        })
        .unwrap();
        event.cancel();

        let f = fired.clone();
        let dropped = ScheduledEvent::after(Duration::from_millis(100), move || {
            f.store(true, Ordering::SeqCst);
        })
        .unwrap();
        drop(dropped);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_no_runtime_schedules_nothing() {
        assert!(ScheduledEvent::after(Duration::from_millis(10), || {}).is_none());
    }
}
