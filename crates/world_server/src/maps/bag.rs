//! Per-instance auxiliary state for challenge-type runs.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use world_core::CharacterId;

/// Lives budget, dead-member set, and countdown clock carried by a map
/// instance. Persistent-world instances carry a default bag that is never
/// consulted.
#[derive(Debug)]
pub struct InstanceBag {
    lives: i32,
    dead: Mutex<HashSet<CharacterId>>,
    countdown: Mutex<Option<Countdown>>,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    started: Instant,
    total: Duration,
}

impl InstanceBag {
    pub fn new(lives: i32) -> Self {
        Self {
            lives,
            dead: Mutex::new(HashSet::new()),
            countdown: Mutex::new(None),
        }
    }

    pub fn lives(&self) -> i32 {
        self.lives
    }

    pub fn dead_count(&self) -> usize {
        self.dead.lock().expect("dead set poisoned").len()
    }

    /// Whether the run still has a life to spend on a revive.
    ///
    /// The last life is not spendable: at one remaining the next death is
    /// terminal for the run.
    pub fn can_consume_life(&self) -> bool {
        self.lives - self.dead_count() as i32 > 1
    }

    /// Records a character as dead for this run. Returns false if they were
    /// already recorded.
    pub fn mark_dead(&self, character_id: CharacterId) -> bool {
        self.dead
            .lock()
            .expect("dead set poisoned")
            .insert(character_id)
    }

    pub fn is_marked_dead(&self, character_id: CharacterId) -> bool {
        self.dead
            .lock()
            .expect("dead set poisoned")
            .contains(&character_id)
    }

    /// Starts (or restarts) the run countdown.
    pub fn start_countdown(&self, total: Duration) {
        *self.countdown.lock().expect("countdown poisoned") = Some(Countdown {
            started: Instant::now(),
            total,
        });
    }

    /// Seconds left on the countdown, if one is running.
    pub fn remaining_secs(&self) -> Option<u64> {
        self.countdown
            .lock()
            .expect("countdown poisoned")
            .map(|c| c.total.saturating_sub(c.started.elapsed()).as_secs())
    }
}

impl Default for InstanceBag {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_accounting() {
        let bag = InstanceBag::new(3);
        assert!(bag.can_consume_life());
        assert!(bag.mark_dead(CharacterId(1)));
        assert!(!bag.mark_dead(CharacterId(1)));
        assert!(bag.can_consume_life());
        bag.mark_dead(CharacterId(2));
        // One life left: next death is terminal.
        assert!(!bag.can_consume_life());
    }

    #[test]
    fn countdown_reports_remaining() {
        let bag = InstanceBag::new(1);
        assert_eq!(bag.remaining_secs(), None);
        bag.start_countdown(Duration::from_secs(600));
        let remaining = bag.remaining_secs().expect("countdown should be running");
        assert!(remaining <= 600 && remaining > 590);
    }
}
