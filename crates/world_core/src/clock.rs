//! Clock abstraction for countdown state machines.
//!
//! Anything in the orchestrator that sleeps between state checks (the revive
//! countdown above all) goes through a [`Clock`] instead of calling
//! `tokio::time::sleep` directly, so unit tests can advance time
//! deterministically with a [`ManualClock`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// A source of suspensions.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspends the calling task for (at least) `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer wheel.
#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock where each `sleep` consumes one manually granted tick.
///
/// Durations are ignored: every call to [`Clock::sleep`] claims the next tick
/// number and resolves once [`ManualClock::advance`] has granted at least
/// that many ticks. Sequential sleeps on one task therefore consume ticks in
/// order, which is exactly the shape of a polling countdown.
#[derive(Debug)]
pub struct ManualClock {
    granted: watch::Sender<u64>,
    claimed: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        let (granted, _) = watch::channel(0);
        Self {
            granted,
            claimed: AtomicU64::new(0),
        }
    }

    /// Grants `ticks` more sleep completions.
    pub fn advance(&self, ticks: u64) {
        self.granted.send_modify(|g| *g += ticks);
    }

    /// Total ticks consumed or currently being waited on.
    pub fn ticks_claimed(&self) -> u64 {
        self.claimed.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, _duration: Duration) {
        let target = self.claimed.fetch_add(1, Ordering::SeqCst) + 1;
        let mut rx = self.granted.subscribe();
        while *rx.borrow_and_update() < target {
            if rx.changed().await.is_err() {
                // Clock dropped; wake the sleeper rather than hang forever.
                return;
            }
        }
    }
}
