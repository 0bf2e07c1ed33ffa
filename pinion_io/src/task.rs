//! Cancellable background toggle tasks.
//!
//! The async pulse/blink variants run on a dedicated thread and sleep on
//! a condition variable instead of a plain `thread::sleep`, so a
//! `cancel()` wakes the worker within one wait and stops further
//! toggling. Cancellation never undoes an in-flight device write; the
//! pin is left in its last-set state.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pinion_common::error::IoError;

// ─── CancelToken ────────────────────────────────────────────────────

/// Cooperative cancellation flag shared between a task handle and its
/// worker thread.
pub struct CancelToken {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelToken {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: Mutex::new(false),
            signal: Condvar::new(),
        })
    }

    /// Request cancellation and wake any waiting worker.
    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock().expect("cancel token lock poisoned");
        *cancelled = true;
        self.signal.notify_all();
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("cancel token lock poisoned")
    }

    /// Sleep up to `timeout`, waking early on cancellation.
    ///
    /// Returns `true` when cancellation was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancelled.lock().expect("cancel token lock poisoned");
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .signal
                .wait_timeout(cancelled, deadline - now)
                .expect("cancel token lock poisoned");
            cancelled = guard;
        }
    }
}

// ─── ToggleTask ─────────────────────────────────────────────────────

/// Handle to an asynchronous pulse/blink running off the calling thread.
///
/// Dropping the handle detaches the task; it keeps running to
/// completion. Use [`cancel`](Self::cancel) to stop further toggling and
/// [`join`](Self::join) to await the outcome.
pub struct ToggleTask {
    token: Arc<CancelToken>,
    handle: Option<JoinHandle<Result<(), IoError>>>,
}

impl ToggleTask {
    /// Spawn a worker thread running `body` with a cancel token.
    pub(crate) fn spawn<F>(name: String, body: F) -> Result<Self, IoError>
    where
        F: FnOnce(&CancelToken) -> Result<(), IoError> + Send + 'static,
    {
        let token = CancelToken::new();
        let worker_token = Arc::clone(&token);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || body(&worker_token))
            .map_err(|e| IoError::Task(format!("failed to spawn toggle thread: {e}")))?;
        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    /// Stop scheduling further toggles. The pin keeps its last-set state.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the worker thread has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Block until the task completes and return its outcome.
    ///
    /// A cancelled task completes with `Ok(())`.
    ///
    /// # Errors
    /// Propagates a device error from the worker; a panicking worker
    /// surfaces as `IoError::Task`.
    pub fn join(mut self) -> Result<(), IoError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| IoError::Task("toggle thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_runs_to_timeout_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_wakes_waiting_worker() {
        let task = ToggleTask::spawn("test-wait".to_string(), |token| {
            // Far longer than the test will allow; cancel cuts it short.
            token.wait(Duration::from_secs(30));
            Ok(())
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        task.cancel();
        task.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn join_surfaces_worker_error() {
        let task = ToggleTask::spawn("test-err".to_string(), |_token| {
            Err(IoError::Task("boom".to_string()))
        })
        .unwrap();
        assert!(matches!(task.join(), Err(IoError::Task(_))));
    }

    #[test]
    fn cancelled_before_wait_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(token.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
