//! Reactor and run-flag primitives shared by the supervisor threads
//!
//! A [`Reactor`] owns the stop signal for one transport. Every call to
//! [`Reactor::run`] builds a fresh single-threaded tokio runtime, drives the
//! transport future on it and tears the runtime down again, so nothing a
//! failed client registered survives into the next attempt.

use crate::error::{GsmPanicError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Granularity at which restart waits notice a cleared run flag
pub const RUN_FLAG_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period for blocking tasks when a reactor runtime is torn down
const REACTOR_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Process-wide enable flag gating every loop iteration and restart wait
#[derive(Debug, Default)]
pub struct RunningFlag {
    running: AtomicBool,
}

impl RunningFlag {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    pub fn is_set(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Set the flag; returns false if it was already set
    pub fn try_set(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the flag; returns false if it was already clear
    pub fn clear(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    /// Sleep up to `total`, returning early once the flag is cleared.
    ///
    /// Returns whether the flag is still set afterwards.
    pub fn wait(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        while self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(RUN_FLAG_POLL_INTERVAL.min(deadline - now));
        }
        self.is_set()
    }
}

/// Event loop owner for one transport
#[derive(Debug)]
pub struct Reactor {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
}

impl Reactor {
    pub fn new(name: &'static str) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { name, stop_tx }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Re-arm the reactor after a previous [`Reactor::stop`]
    pub fn reset(&self) {
        self.stop_tx.send_replace(false);
    }

    /// Stop the current run and make future runs return immediately until reset.
    ///
    /// Safe to call from any thread.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Drive `task` on a fresh runtime until it finishes or the reactor is stopped.
    ///
    /// A stop resolves to `Ok(())`; the task future, and with it the client it
    /// owns, is dropped before this returns.
    pub fn run<F, Fut>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                GsmPanicError::generic(format!("Failed to build {} reactor: {}", self.name, e))
            })?;

        let mut stop_rx = self.stop_tx.subscribe();
        let result = runtime.block_on(async move {
            tokio::select! {
                res = task() => res,
                _ = stop_rx.wait_for(|stopped| *stopped) => Ok(()),
            }
        });

        runtime.shutdown_timeout(REACTOR_SHUTDOWN_GRACE);
        result
    }
}

/// Latch released when the supervisor loop has fully exited
#[derive(Debug)]
pub struct ExitLatch {
    exited: Mutex<bool>,
    cond: Condvar,
}

impl Default for ExitLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitLatch {
    /// Create a released latch; nothing is running yet
    pub const fn new() -> Self {
        Self {
            exited: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// Mark the loop as running
    pub fn arm(&self) {
        *self.exited.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Mark the loop as exited and wake all waiters
    pub fn release(&self) {
        *self.exited.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    /// Block until [`ExitLatch::release`] has been called since the last arm
    pub fn wait(&self) {
        let mut exited = self.exited.lock().unwrap_or_else(PoisonError::into_inner);
        while !*exited {
            exited = self
                .cond
                .wait(exited)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn running_flag_set_is_exclusive() {
        let flag = RunningFlag::new();
        assert!(flag.try_set());
        assert!(!flag.try_set());
        assert!(flag.clear());
        assert!(!flag.clear());
    }

    #[test]
    fn wait_returns_early_when_cleared() {
        let flag = Arc::new(RunningFlag::new());
        flag.try_set();
        let clearer = {
            let flag = flag.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                flag.clear();
            })
        };
        let started = Instant::now();
        assert!(!flag.wait(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(2));
        clearer.join().unwrap();
    }

    #[test]
    fn wait_runs_full_delay_while_set() {
        let flag = RunningFlag::new();
        flag.try_set();
        let started = Instant::now();
        assert!(flag.wait(Duration::from_millis(150)));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn run_returns_task_result() {
        let reactor = Reactor::new("test");
        assert!(reactor.run(|| async { Ok(()) }).is_ok());
        let err = reactor
            .run(|| async { Err(GsmPanicError::serial("boom")) })
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn stop_unblocks_pending_run() {
        let reactor = Arc::new(Reactor::new("test"));
        let stopper = {
            let reactor = reactor.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                reactor.stop();
            })
        };
        let res = reactor.run(|| std::future::pending::<Result<()>>());
        assert!(res.is_ok());
        assert!(reactor.is_stopped());
        stopper.join().unwrap();

        // Stays stopped until reset
        assert!(reactor.run(|| std::future::pending::<Result<()>>()).is_ok());
        reactor.reset();
        assert!(!reactor.is_stopped());
    }

    #[test]
    fn exit_latch_wakes_waiter() {
        let latch = Arc::new(ExitLatch::new());
        latch.arm();
        let waiter = {
            let latch = latch.clone();
            std::thread::spawn(move || latch.wait())
        };
        std::thread::sleep(Duration::from_millis(20));
        latch.release();
        waiter.join().unwrap();
    }
}
