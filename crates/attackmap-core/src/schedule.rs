//! Periodic background tasks, torn down together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::DashboardConfig;
use crate::context::Dashboard;

/// Shortest period a periodic task may run at.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Periods of the dashboard's maintenance tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskIntervals {
    /// Cache retention cleanup.
    pub cleanup: Duration,
    /// Timeline advance and rolling rescan.
    pub refresh: Duration,
    /// Connection state reclassification.
    pub poll: Duration,
    /// Staleness logging.
    pub heartbeat: Duration,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            cleanup: Duration::from_secs(300),
            refresh: Duration::from_secs(5),
            poll: Duration::from_secs(2),
            heartbeat: Duration::from_secs(30),
        }
    }
}

impl TaskIntervals {
    /// Intervals from the loaded configuration.
    pub const fn from_config(config: &DashboardConfig) -> Self {
        Self {
            cleanup: config.store.cleanup_interval(),
            refresh: config.aggregation.refresh_interval(),
            poll: config.upstream.poll_interval(),
            heartbeat: config.upstream.heartbeat_interval(),
        }
    }
}

/// Named, independently cancellable background tasks.
///
/// Dropping the set aborts every task it still holds.
#[derive(Debug, Default)]
pub struct ScheduledTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl ScheduledTasks {
    /// An empty task set.
    pub const fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn the cleanup, refresh, poll, and heartbeat tasks for `dashboard`.
    ///
    /// Each task runs immediately and then once per period.
    pub fn spawn_maintenance(dashboard: &Arc<Dashboard>, intervals: TaskIntervals) -> Self {
        let mut tasks = Self::new();

        let d = Arc::clone(dashboard);
        tasks.spawn_periodic("cleanup", intervals.cleanup, move || {
            let d = Arc::clone(&d);
            async move {
                match d.cleanup().await {
                    Ok(report) if report.expired > 0 || report.evicted > 0 => tracing::info!(
                        expired = report.expired,
                        evicted = report.evicted,
                        remaining = report.remaining,
                        "Cache cleanup removed events"
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Cache cleanup failed"),
                }
            }
        });

        let d = Arc::clone(dashboard);
        tasks.spawn_periodic("refresh", intervals.refresh, move || {
            let d = Arc::clone(&d);
            async move { d.refresh().await }
        });

        let d = Arc::clone(dashboard);
        tasks.spawn_periodic("connection-poll", intervals.poll, move || {
            let d = Arc::clone(&d);
            async move {
                d.poll_connection().await;
            }
        });

        let d = Arc::clone(dashboard);
        tasks.spawn_periodic("heartbeat", intervals.heartbeat, move || {
            let d = Arc::clone(&d);
            async move {
                d.heartbeat().await;
            }
        });

        tasks
    }

    /// Run `task` now and then every `period` until aborted.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        tracing::debug!(task = name, period_ms = period.as_millis(), "Scheduled task");
        self.handles.push((name, handle));
    }

    /// Track an already spawned task under `name`.
    pub fn insert(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    /// Names of tasks that have not finished.
    pub fn running(&self) -> Vec<&'static str> {
        self.handles
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Number of tracked tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no task is tracked.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every task and wait for them to unwind.
    pub async fn shutdown(mut self) {
        let handles = std::mem::take(&mut self.handles);
        for (_, handle) in &handles {
            handle.abort();
        }
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(task = name, error = %e, "Task ended abnormally");
                }
            }
        }
        tracing::info!("Scheduled tasks stopped");
    }
}

impl Drop for ScheduledTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn periodic_task_runs_immediately_then_each_period() {
        let count = Arc::new(AtomicU32::new(0));
        let mut tasks = ScheduledTasks::new();
        let c = Arc::clone(&count);
        tasks.spawn_periodic("count", Duration::from_secs(5), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.running(), vec!["count"]);

        tasks.shutdown().await;
        let frozen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), frozen);
    }

    #[tokio::test]
    async fn drop_aborts_tasks() {
        let mut tasks = ScheduledTasks::new();
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort = handle.abort_handle();
        tasks.insert("pending", handle);
        assert_eq!(tasks.len(), 1);
        drop(tasks);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }
}
