//! Background worker pool for blocking DNS provider calls.
//!
//! Driver calls block on network IO, so the [DNS-01 responder][crate::responder::dns] never runs
//! them on the caller's scheduler. A [`WorkerPool`] owns a dedicated runtime whose bounded
//! blocking pool executes them; the caller awaits the result as an ordinary future.
//!
//! The runtime is built on first use and torn down by [`WorkerPool::shutdown`] (or on drop).
//! [`WorkerPool::shared`] hands out a process-wide instance for callers that don't need their
//! own.

use crate::error::Error;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};

/// Default bound on concurrently executing provider calls.
pub const DEFAULT_MAX_THREADS: usize = 10;

lazy_static! {
    static ref SHARED: Arc<WorkerPool> = Arc::new(WorkerPool::new(DEFAULT_MAX_THREADS));
}

pub struct WorkerPool {
    max_threads: usize,
    runtime: Mutex<Option<Runtime>>,
}

impl WorkerPool {
    /// A pool running at most `max_threads` blocking calls at once. Nothing is started until
    /// the first [`run`][Self::run].
    #[must_use]
    pub fn new(max_threads: usize) -> Self {
        Self {
            max_threads: max_threads.max(1),
            runtime: Mutex::new(None),
        }
    }

    /// The process-wide pool.
    #[must_use]
    pub fn shared() -> Arc<WorkerPool> {
        SHARED.clone()
    }

    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Execute the blocking `task` on the pool, starting the pool if needed, and wait for its
    /// result without blocking the calling task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the pool's runtime can't be started, [`Error::WorkerPool`] if
    /// the task panics or the pool is shut down before it completes, and otherwise whatever the
    /// task itself returns.
    pub async fn run<F, T>(&self, task: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.handle()?;
        handle.spawn_blocking(task).await?
    }

    /// Stop the pool. Queued tasks are abandoned and their callers see [`Error::WorkerPool`].
    /// A later [`run`][Self::run] starts a fresh pool.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            tracing::debug!("shutting down DNS worker pool");
            runtime.shutdown_background();
        }
    }

    fn handle(&self) -> Result<Handle, Error> {
        let mut runtime = self.runtime.lock();
        if let Some(runtime) = runtime.as_ref() {
            return Ok(runtime.handle().clone());
        }
        tracing::debug!("starting DNS worker pool ({} threads)", self.max_threads);
        let started = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.max_threads)
            .thread_name("dns-worker")
            .build()?;
        let handle = started.handle().clone();
        *runtime = Some(started);
        Ok(handle)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_threads", &self.max_threads)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[tokio::test]
    async fn starts_lazily_and_restarts_after_shutdown() {
        let pool = WorkerPool::new(2);
        assert!(!pool.is_running());

        let caller = thread::current().id();
        let worker = pool.run(move || Ok(thread::current().id())).await.unwrap();
        assert_ne!(worker, caller);
        assert!(pool.is_running());

        pool.shutdown();
        assert!(!pool.is_running());

        assert_eq!(pool.run(|| Ok(7)).await.unwrap(), 7);
        assert!(pool.is_running());
    }

    #[tokio::test]
    async fn task_errors_are_returned() {
        let pool = WorkerPool::new(1);
        let result: Result<(), Error> = pool
            .run(|| Err(Error::UnknownToken("abc".to_string())))
            .await;
        assert!(matches!(result, Err(Error::UnknownToken(token)) if token == "abc"));
    }

    #[tokio::test]
    async fn task_panics_surface_as_pool_errors() {
        let pool = WorkerPool::new(1);
        let result: Result<(), Error> = pool.run(|| panic!("provider exploded")).await;
        assert!(matches!(result, Err(Error::WorkerPool(_))));
    }

    #[test]
    fn shared_pool_is_one_instance() {
        assert!(Arc::ptr_eq(&WorkerPool::shared(), &WorkerPool::shared()));
        assert_eq!(WorkerPool::new(0).max_threads(), 1);
    }
}
