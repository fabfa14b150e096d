//! Async runtime utilities.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

/// Configuration for the runtime backing blocking callers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = num_cpus).
    pub worker_threads: usize,
    /// Thread name prefix.
    pub thread_name: String,
    /// Enable I/O driver.
    pub enable_io: bool,
    /// Enable time driver.
    pub enable_time: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            thread_name: "conduit".to_string(),
            enable_io: true,
            enable_time: true,
        }
    }
}

/// Build a configured Tokio runtime.
pub fn build_runtime(config: RuntimeConfig) -> std::io::Result<Runtime> {
    let mut builder = Builder::new_multi_thread();

    if config.worker_threads > 0 {
        builder.worker_threads(config.worker_threads);
    }

    builder.thread_name(&config.thread_name);

    if config.enable_io {
        builder.enable_io();
    }

    if config.enable_time {
        builder.enable_time();
    }

    builder.build()
}

/// A clonable cancellation signal shared between a caller and a running
/// request or poller.
///
/// Once cancelled a handle stays cancelled; late subscribers observe it.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Create a new, not-yet-cancelled handle.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signal cancellation to every clone of this handle.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once cancellation is signalled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel automatically once `deadline` elapses.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn cancel_after(&self, deadline: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        spawn_named("cancel-deadline", async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => handle.cancel(),
                _ = handle.cancelled() => {}
            }
        })
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Drive `sleep` to completion unless `cancel` fires first.
pub async fn sleep_or_cancel<F>(sleep: F, cancel: &CancelHandle) -> Result<(), Cancelled>
where
    F: Future<Output = ()>,
{
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        _ = sleep => Ok(()),
    }
}

/// Run a future with a timeout.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError)
}

/// Timeout error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("operation timed out")]
pub struct TimeoutError;

/// Spawn a task with a name for debugging.
/// Task naming requires tokio's unstable features, so the name is only logged.
pub fn spawn_named<F>(name: &'static str, future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tracing::trace!(task = name, "spawning task");
    tokio::spawn(future)
}
