//! `ExecutionBackend` SPI (§6, §4.8 ambient addition)
//!
//! The core only needs `schedule`/`cancel`/`is_running`; this ships one
//! concrete backend on `tokio` intervals/sleeps (one background task per
//! active trigger, cooperatively cancelled), resolving Open Question (a):
//! `async` is this implementation's only shipped branch.

use super::schedule::ParsedSchedule;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub type FireFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Cooperative cancellation handle: a background task polls `cancelled()`
/// (via `wait_or_cancelled`) instead of being killed outright, so in-flight
/// firings finish cleanly.
struct CancelHandle {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, returning early (with `true`) if cancelled.
    async fn sleep_or_cancelled(&self, duration: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
            _ = self.notify.notified() => true,
        }
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Schedule `fire` according to `schedule`, returning a backend task id.
    async fn schedule(&self, task_id: String, schedule: ParsedSchedule, fire: FireFn);
    async fn cancel(&self, task_id: &str);
    async fn is_running(&self, task_id: &str) -> bool;
}

struct RunningTask {
    handle: JoinHandle<()>,
    cancel: Arc<CancelHandle>,
}

/// The shipped `tokio`-based backend (§4.8 ambient addition).
#[derive(Default)]
pub struct TokioExecutionBackend {
    tasks: parking_lot::Mutex<HashMap<String, RunningTask>>,
}

impl TokioExecutionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionBackend for TokioExecutionBackend {
    async fn schedule(&self, task_id: String, schedule: ParsedSchedule, fire: FireFn) {
        self.cancel(&task_id).await;
        let cancel = CancelHandle::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut after = Utc::now();
            loop {
                let Some(next) = schedule.next_after(after) else {
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
                if task_cancel.sleep_or_cancelled(wait).await {
                    break;
                }
                fire().await;
                after = Utc::now();
                if matches!(schedule, ParsedSchedule::OneTime { .. }) {
                    break;
                }
            }
        });
        self.tasks.lock().insert(task_id, RunningTask { handle, cancel });
    }

    async fn cancel(&self, task_id: &str) {
        if let Some(task) = self.tasks.lock().remove(task_id) {
            task.cancel.cancel();
            task.handle.abort();
        }
    }

    async fn is_running(&self, task_id: &str) -> bool {
        self.tasks
            .lock()
            .get(task_id)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::ScheduleMode;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn one_time_schedule_fires_once_then_stops() {
        let backend = TokioExecutionBackend::new();
        let count = Arc::new(AtomicUsize::new(0));
        let schedule =
            ParsedSchedule::parse(ScheduleMode::OneTime, &(Utc::now() + chrono::Duration::milliseconds(30)).to_rfc3339())
                .unwrap();
        let counter = count.clone();
        backend
            .schedule(
                "t1".to_string(),
                schedule,
                Arc::new(move || {
                    let counter = counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            )
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_stops_a_scheduled_task() {
        let backend = TokioExecutionBackend::new();
        let count = Arc::new(AtomicUsize::new(0));
        let schedule =
            ParsedSchedule::parse(ScheduleMode::OneTime, &(Utc::now() + chrono::Duration::milliseconds(200)).to_rfc3339())
                .unwrap();
        let counter = count.clone();
        backend
            .schedule(
                "t1".to_string(),
                schedule,
                Arc::new(move || {
                    let counter = counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            )
            .await;
        backend.cancel("t1").await;
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!backend.is_running("t1").await);
    }
}
