//! Worker pool, futures, and cooperative cancellation.
//!
//! Tile dispatch (`tilework-tiling`) and reduction need two things from a
//! thread pool: fire-and-collect single tasks, and "run these two branches,
//! then run a continuation once both are done." Rather than hand-rolling a
//! continuation/callback bookkeeping system (as the C++ original does with
//! Boost.Asynchronous), this crate leans on [`rayon::ThreadPool::join`]:
//! its call stack already blocks until both children are done, which is
//! exactly the "continuation fires once, after the last child" semantics
//! spec.md asks for — no extra bookkeeping needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tilework_core::error::{Error, Result};

/// A pool of worker threads used for tile dispatch and reduction.
///
/// Thin wrapper over [`rayon::ThreadPool`] so callers depend on this crate's
/// API rather than rayon directly.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Builds a pool with exactly `num_threads` worker threads.
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("tilework-worker-{i}"))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build worker pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Builds a pool sized to the number of logical CPUs.
    pub fn with_default_parallelism() -> Result<Self> {
        Self::new(num_cpus::get().max(1))
    }

    /// Number of worker threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Submits `f` to run on the pool, returning a [`PoolFuture`] to collect its result.
    pub fn submit<F, T>(&self, f: F) -> PoolFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.pool.spawn(move || {
            let result = f();
            // The receiver may have been dropped if the caller gave up waiting;
            // that's not an error here, there's simply nowhere left to deliver to.
            let _ = tx.send(result);
        });
        PoolFuture { rx }
    }

    /// Runs `a` and `b` in parallel on the pool and blocks until both finish,
    /// returning both results. This is the pool's continuation primitive:
    /// recursive tile splitting uses it to fan out into two sub-tiles and
    /// only proceed once both sides have completed.
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        self.pool.join(a, b)
    }

    /// Runs `f` with access to a rayon scope, for fanning out an arbitrary
    /// (not just binary) number of tasks that must all complete before
    /// `scope` returns.
    pub fn scope<'scope, F>(&self, f: F)
    where
        F: FnOnce(&rayon::Scope<'scope>) + Send,
    {
        self.pool.scope(f)
    }
}

/// A handle to a result that a [`WorkerPool`] task will eventually produce.
pub struct PoolFuture<T> {
    rx: crossbeam_channel::Receiver<T>,
}

impl<T> PoolFuture<T> {
    /// Blocks until the task completes, returning its result.
    ///
    /// Returns `Error::Internal` if the task panicked before sending a result.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| Error::Internal("worker task panicked before producing a result".into()))
    }

    /// Blocks until the task completes or `timeout` elapses.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => Error::Timeout(timeout),
            crossbeam_channel::RecvTimeoutError::Disconnected => {
                Error::Internal("worker task panicked before producing a result".into())
            }
        })
    }
}

/// Cooperative cancellation flag, checked by long-running tasks at safe points.
///
/// A wall-clock timeout (spec.md §6) is implemented by spawning a timer
/// thread that calls [`CancellationToken::cancel`] after the deadline; every
/// tile task and pipeline stage checks [`CancellationToken::check`] at entry
/// and bails out with `Error::Cancelled` rather than polling a deadline
/// directly.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationInner {
                cancelled: AtomicBool::new(false),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    /// Marks the token cancelled and wakes any thread blocked in [`Self::park_timeout`].
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().expect("cancellation mutex poisoned");
        self.inner.cvar.notify_all();
    }

    /// `true` once [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::Cancelled)` if the token has been cancelled, `Ok(())` otherwise.
    ///
    /// Called at the entry of every tile task and pipeline stage step.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blocks the calling thread until `timeout` elapses or the token is
    /// cancelled, whichever comes first. Used by the wall-clock timeout
    /// driver thread to sleep without spinning.
    pub fn park_timeout(&self, timeout: Duration) {
        if self.is_cancelled() {
            return;
        }
        let guard = self.inner.lock.lock().expect("cancellation mutex poisoned");
        let _ = self
            .inner
            .cvar
            .wait_timeout_while(guard, timeout, |_| {
                !self.inner.cancelled.load(Ordering::SeqCst)
            })
            .expect("cancellation mutex poisoned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn submit_delivers_result() {
        let pool = WorkerPool::new(2).unwrap();
        let fut = pool.submit(|| 2 + 2);
        assert_eq!(fut.wait().unwrap(), 4);
    }

    #[test]
    fn join_runs_both_branches() {
        let pool = WorkerPool::new(2).unwrap();
        let (a, b) = pool.join(|| 10, || 20);
        assert_eq!(a + b, 30);
    }

    #[test]
    fn wait_timeout_errors_when_task_is_slow() {
        let pool = WorkerPool::new(1).unwrap();
        let fut = pool.submit(|| {
            std::thread::sleep(Duration::from_millis(200));
            1
        });
        let err = fut.wait_timeout(Duration::from_millis(10));
        assert!(matches!(err, Err(Error::Timeout(_))));
    }

    #[test]
    fn cancellation_token_check_reflects_cancel() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.check().is_err());
        assert!(token.is_cancelled());
    }

    #[test]
    fn park_timeout_wakes_early_on_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || {
            let start = std::time::Instant::now();
            waiter.park_timeout(Duration::from_secs(10));
            start.elapsed()
        });
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        let elapsed = handle.join().unwrap();
        assert!(elapsed < Duration::from_secs(1));
    }
}
