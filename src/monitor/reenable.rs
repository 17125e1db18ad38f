//! Cancelable deferred actions keyed by identity.
//!
//! Replaces ad-hoc timer callback chains: each key holds at most one pending
//! action, scheduling again replaces the previous one, and cancellation is
//! immediate. Delays run on tokio time, so tests drive them with a paused
//! clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A set of cancelable scheduled tasks, one per key.
///
/// Scheduling requires a running tokio runtime.
#[derive(Debug, Default)]
pub struct ScheduledTasks {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ScheduledTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, replacing any task already scheduled for
    /// this key.
    pub fn schedule<F>(&self, key: impl Into<String>, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        let mut tasks = self.tasks.lock().expect("scheduled task table poisoned");
        if let Some(previous) = tasks.insert(key.into(), handle) {
            previous.abort();
        }
    }

    /// Cancel the task scheduled for `key`, if any.
    pub fn cancel(&self, key: &str) {
        let mut tasks = self.tasks.lock().expect("scheduled task table poisoned");
        if let Some(handle) = tasks.remove(key) {
            handle.abort();
        }
    }

    /// Cancel every scheduled task.
    pub fn cancel_all(&self) {
        let mut tasks = self.tasks.lock().expect("scheduled task table poisoned");
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }

    /// Whether a task is currently scheduled for `key`.
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .expect("scheduled task table poisoned")
            .contains_key(key)
    }
}

impl Drop for ScheduledTasks {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn scheduled_action_fires_after_delay() {
        let tasks = ScheduledTasks::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        tasks.schedule("k", Duration::from_secs(10), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let tasks = ScheduledTasks::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        tasks.schedule("k", Duration::from_secs(10), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        tasks.cancel("k");

        tokio::time::sleep(Duration::from_secs(20)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!tasks.is_scheduled("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_pending_action() {
        let tasks = ScheduledTasks::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let fired_clone = fired.clone();
            tasks.schedule("k", Duration::from_secs(10), async move {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
