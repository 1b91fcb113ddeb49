//! Shutdown barrier
//!
//! A countdown armed when shutdown begins. Every session that finishes
//! its leave path arrives once; the shutdown caller waits until the
//! count reaches zero or a deadline passes.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Countdown owned by the orchestrator
#[derive(Debug)]
pub struct ShutdownBarrier {
    total: usize,
    tx: watch::Sender<usize>,
}

impl ShutdownBarrier {
    /// Arm a barrier for `total` draining sessions
    pub fn new(total: usize) -> Self {
        let (tx, _rx) = watch::channel(total);
        Self { total, tx }
    }

    /// One session finished its leave path. Saturates at zero.
    pub fn arrive(&self) {
        self.tx.send_modify(|remaining| *remaining = remaining.saturating_sub(1));
        debug!(remaining = *self.tx.borrow(), "Shutdown barrier arrival");
    }

    pub fn remaining(&self) -> usize {
        *self.tx.borrow()
    }

    /// Handle for whoever awaits completion
    pub fn waiter(&self) -> ShutdownWaiter {
        ShutdownWaiter {
            total: self.total,
            rx: self.tx.subscribe(),
        }
    }
}

/// Outcome of a shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Sessions active when shutdown began
    pub total: usize,
    /// Sessions that had not finished leaving when the wait returned
    pub remaining: usize,
    pub timed_out: bool,
}

/// Awaits a `ShutdownBarrier`
#[derive(Debug)]
pub struct ShutdownWaiter {
    total: usize,
    rx: watch::Receiver<usize>,
}

impl ShutdownWaiter {
    /// True once every session has arrived
    pub fn done(&self) -> bool {
        *self.rx.borrow() == 0
    }

    /// Wait until the count reaches zero.
    ///
    /// Also returns if the barrier is dropped, which only happens when
    /// the orchestrator itself has gone away.
    pub async fn wait(&mut self) -> ShutdownReport {
        let _ = self.rx.wait_for(|remaining| *remaining == 0).await;
        self.report(false)
    }

    /// Wait with a deadline
    pub async fn wait_timeout(&mut self, timeout: Duration) -> ShutdownReport {
        let timed_out =
            tokio::time::timeout(timeout, self.rx.wait_for(|remaining| *remaining == 0))
                .await
                .is_err();
        self.report(timed_out)
    }

    fn report(&self, timed_out: bool) -> ShutdownReport {
        ShutdownReport {
            total: self.total,
            remaining: *self.rx.borrow(),
            timed_out,
        }
    }
}
