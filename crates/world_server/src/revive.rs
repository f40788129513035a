//! Per-character revive countdown.
//!
//! When a character's health reaches zero the orchestrator presents a revive
//! prompt and then watches their health once per second for up to thirty
//! ticks. Health observed above zero cancels the countdown; a full window at
//! zero auto-revives. The anchor policy applied on auto-revive depends on
//! the map-instance kind and lives in the orchestrator façade; this module
//! only owns the timing state machine.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use world_core::{Clock, Packet};

use crate::session::Session;

/// Number of one-second health checks before an auto-revive fires.
pub const REVIVE_TICKS: u32 = 30;

/// Terminal state of one revive countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviveOutcome {
    /// Health was observed above zero before the window closed.
    Cancelled { tick: u32 },
    /// Health stayed at zero for the whole window; auto-revive fires.
    Revived,
}

/// Drives revive countdowns against an injected clock.
pub struct ReviveWorkflow {
    clock: Arc<dyn Clock>,
}

impl ReviveWorkflow {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Puts a freshly dead character into the prompted state: dismounts,
    /// clears timed buffs, resynchronizes stats and condition, and shows the
    /// revive prompt.
    pub async fn prepare_death(&self, session: &Session, prompt: String) {
        {
            let mut character = session.character_mut().await;
            character.mounted = false;
            character.buffs.clear();
        }
        let character = session.character().await;
        session.send(character.stats_packet());
        session.send(character.condition_packet());
        drop(character);
        session.send(Packet::Dialog { prompt });
    }

    /// Runs the countdown: one clock tick per second, up to [`REVIVE_TICKS`].
    ///
    /// Cancellation is implicit: the first tick that observes health above
    /// zero ends the countdown without an auto-revive.
    pub async fn run_countdown(&self, session: &Session) -> ReviveOutcome {
        for tick in 1..=REVIVE_TICKS {
            self.clock.sleep(Duration::from_secs(1)).await;
            let hp = session.character().await.hp;
            if hp > 0 {
                debug!(
                    "💓 Revive countdown for {} cancelled at tick {}",
                    session.character_name(),
                    tick
                );
                return ReviveOutcome::Cancelled { tick };
            }
        }
        debug!(
            "⚰️ Revive countdown for {} elapsed; auto-revive",
            session.character_name()
        );
        ReviveOutcome::Revived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CharacterField;
    use crate::test_support::test_session;
    use world_core::ManualClock;

    #[tokio::test(flavor = "multi_thread")]
    async fn health_recovery_cancels_countdown() {
        let clock = Arc::new(ManualClock::new());
        let (session, _rx) = test_session(1, "Ada");
        session.character_mut().await.set_field(CharacterField::Hp, 0);

        let countdown = {
            let session = session.clone();
            let workflow = ReviveWorkflow::new(clock.clone());
            tokio::spawn(async move { workflow.run_countdown(&session).await })
        };

        // Four ticks at zero health, then recovery before the fifth check.
        clock.advance(4);
        while clock.ticks_claimed() < 5 {
            tokio::task::yield_now().await;
        }
        session.character_mut().await.set_field(CharacterField::Hp, 120);
        clock.advance(1);

        let outcome = countdown.await.expect("countdown task panicked");
        assert_eq!(outcome, ReviveOutcome::Cancelled { tick: 5 });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_window_at_zero_revives_at_tick_thirty() {
        let clock = Arc::new(ManualClock::new());
        let (session, _rx) = test_session(1, "Ada");
        session.character_mut().await.set_field(CharacterField::Hp, 0);

        let countdown = {
            let session = session.clone();
            let workflow = ReviveWorkflow::new(clock.clone());
            tokio::spawn(async move { workflow.run_countdown(&session).await })
        };

        clock.advance(29);
        tokio::task::yield_now().await;
        assert!(!countdown.is_finished());

        clock.advance(1);
        let outcome = countdown.await.expect("countdown task panicked");
        assert_eq!(outcome, ReviveOutcome::Revived);
        assert_eq!(clock.ticks_claimed(), u64::from(REVIVE_TICKS));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prepare_death_clears_mount_and_prompts() {
        let clock = Arc::new(ManualClock::new());
        let workflow = ReviveWorkflow::new(clock);
        let (session, mut rx) = test_session(1, "Ada");
        {
            let mut character = session.character_mut().await;
            character.mounted = true;
            character.buffs = vec![10, 11];
            character.set_field(CharacterField::Hp, 0);
        }

        workflow
            .prepare_death(&session, "ASK_REVIVE".to_string())
            .await;

        let character = session.character().await;
        assert!(!character.mounted);
        assert!(character.buffs.is_empty());
        drop(character);

        let mut saw_prompt = false;
        while let Ok(packet) = rx.try_recv() {
            if matches!(&packet, Packet::Dialog { prompt } if prompt == "ASK_REVIVE") {
                saw_prompt = true;
            }
        }
        assert!(saw_prompt);
    }
}
