//! Stop-phase coordination for a world node.
//!
//! One `ShutdownState` is cloned into the scheduler, the sync bridge, and the
//! world façade. Stopping is two-phase: the node first drains (scheduled
//! tasks skip their remaining ticks while the final character flush runs),
//! then settles once in-flight work is done.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;

/// The phases a world node moves through while stopping, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    /// Serving normally.
    Running,
    /// A stop was requested; periodic work stands down while the final
    /// character flush runs.
    Draining,
    /// Everything in flight has settled; the process may exit.
    Settled,
}

/// Shared stop-phase tracker. Phases only ever advance.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    phase: Arc<AtomicU8>,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicU8::new(ShutdownPhase::Running as u8)),
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::Acquire) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Settled,
        }
    }

    /// True once a stop was requested. Scheduled tasks check this before
    /// every tick and skip their body when it holds.
    pub fn is_draining(&self) -> bool {
        self.phase() >= ShutdownPhase::Draining
    }

    /// True once in-flight work has settled and final cleanup may begin.
    pub fn is_settled(&self) -> bool {
        self.phase() == ShutdownPhase::Settled
    }

    /// Requests a stop. A repeated call is a no-op.
    pub fn begin_draining(&self) {
        if self.advance(ShutdownPhase::Running, ShutdownPhase::Draining) {
            info!("🛑 Shutdown requested - scheduled tasks are standing down");
        }
    }

    /// Records that in-flight work has settled. Only valid from the
    /// draining phase; out-of-order calls are ignored.
    pub fn mark_settled(&self) {
        if self.advance(ShutdownPhase::Draining, ShutdownPhase::Settled) {
            info!("✅ World node settled - ready for final cleanup");
        }
    }

    fn advance(&self, from: ShutdownPhase, to: ShutdownPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order() {
        let state = ShutdownState::new();
        assert_eq!(state.phase(), ShutdownPhase::Running);
        assert!(!state.is_draining());

        state.begin_draining();
        assert_eq!(state.phase(), ShutdownPhase::Draining);
        assert!(state.is_draining());
        assert!(!state.is_settled());

        state.mark_settled();
        assert!(state.is_settled());
        assert!(state.is_draining());
    }

    #[test]
    fn settling_before_draining_is_ignored() {
        let state = ShutdownState::new();
        state.mark_settled();
        assert_eq!(state.phase(), ShutdownPhase::Running);
    }

    #[test]
    fn clones_share_one_phase() {
        let state = ShutdownState::new();
        let observer = state.clone();
        state.begin_draining();
        assert!(observer.is_draining());
    }
}
