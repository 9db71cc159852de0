//! Delayed-task scheduling
//!
//! A thin wrapper over the tokio timer giving the stage the
//! `schedule_once(delay, task)` contract actors rely on for timeouts and
//! deferred work. Tasks run on the shared runtime; a handle allows
//! cancellation before the delay elapses.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Stage-owned timer facade
#[derive(Debug, Default, Clone)]
pub struct Scheduler;

impl Scheduler {
    /// New scheduler
    pub fn new() -> Self {
        Self
    }

    /// Run `task` once after `delay`
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> ScheduledTask
    where
        F: FnOnce() + Send + 'static,
    {
        ScheduledTask {
            handle: tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                task();
            }),
        }
    }
}

/// Handle to a scheduled task
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Cancel the task if it has not run yet
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the task has run or been cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_schedule_once_runs_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let scheduler = Scheduler::new();

        let flag = fired.clone();
        scheduler.schedule_once(Duration::from_millis(10), move || {
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_before_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let scheduler = Scheduler::new();

        let flag = fired.clone();
        let task = scheduler.schedule_once(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });
        task.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
