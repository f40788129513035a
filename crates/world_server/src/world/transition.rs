//! The map-transition protocol.

use tracing::{debug, warn};
use world_core::{BroadcastFilter, CharacterId, Coordinates, MapInstanceKind, Packet};

use crate::error::WorldError;
use crate::world::core::WorldContext;

impl WorldContext {
    /// Moves a character onto `target` at `position`.
    ///
    /// Re-entrant transitions from the same character are rejected while one
    /// is in flight. Each step is best-effort; a failure is logged, the
    /// in-transition flag is cleared, and the character is never left stuck.
    pub async fn change_map_instance(
        &self,
        character_id: CharacterId,
        target: world_core::MapInstanceId,
        position: Coordinates,
    ) -> Result<(), WorldError> {
        let session = self
            .sessions
            .get(character_id)
            .ok_or(WorldError::CharacterNotFound(character_id))?;
        if !session.begin_transition() {
            debug!(
                "🚪 Transition already in flight for {}; rejecting",
                session.character_name()
            );
            return Ok(());
        }

        let result = self.run_transition(&session, target, position).await;
        session.end_transition();
        if let Err(err) = &result {
            warn!(
                "⚠️ Map transition for {} failed: {}",
                session.character_name(),
                err
            );
        }
        result
    }

    async fn run_transition(
        &self,
        session: &std::sync::Arc<crate::session::Session>,
        target: world_core::MapInstanceId,
        position: Coordinates,
    ) -> Result<(), WorldError> {
        let character_id = session.character_id();

        // Close anything that pins the character to the old map.
        {
            let mut character = session.character_mut().await;
            character.shop_open = false;
            character.trading = false;
        }

        // Announce departure and detach from the old instance.
        if let Some(old_id) = session.current_instance() {
            if let Some(old_instance) = self.instances.lookup(old_id) {
                old_instance.broadcast(
                    Packet::EntityOut { character_id },
                    BroadcastFilter::AllExcept(character_id),
                );
                old_instance.unregister_session(character_id);
            }
        }
        session.clear_low_priority_queue();

        let instance = self
            .instances
            .lookup(target)
            .ok_or(WorldError::InstanceNotFound(target))?;

        // Update the character's position; persistent entries also update
        // the stored coordinates that survive a disconnect.
        {
            let mut character = session.character_mut().await;
            character.position = position;
            if instance.kind() == MapInstanceKind::Persistent {
                character.map_id = instance.map_id();
                character.map_x = position.x;
                character.map_y = position.y;
            }
        }
        session.set_current_instance(Some(instance.id()));
        instance.register_session(session.clone());

        // Full resynchronization set for the transitioning session.
        {
            let character = session.character().await;
            session.send(Packet::CharacterInfo {
                character_id: character.id,
                name: character.name.clone(),
                level: character.level,
            });
            session.send(character.stats_packet());
            session.send(character.condition_packet());
            session.send(Packet::Equipment {
                item_ids: character.transient_items.iter().map(|i| i.item_id).collect(),
            });
            session.send(Packet::MapEntered {
                map_id: instance.map_id(),
                position,
            });
        }
        if let Some(remaining_secs) = instance.bag().remaining_secs() {
            session.send(Packet::ClockSync { remaining_secs });
        }

        // Nearby entities for the newcomer.
        for occupant in instance.sessions() {
            if occupant.character_id() == character_id {
                continue;
            }
            let other = occupant.character().await;
            session.send(Packet::EntityIn {
                character_id: other.id,
                name: other.name.clone(),
                position: other.position,
            });
        }

        // Announce arrival to everyone already there.
        {
            let character = session.character().await;
            instance.broadcast(
                Packet::EntityIn {
                    character_id,
                    name: character.name.clone(),
                    position,
                },
                BroadcastFilter::AllExcept(character_id),
            );
        }

        self.update_group_roster(character_id).await;
        instance.run_entry_triggers(session);
        // Notices deferred while the resynchronization set went out.
        session.flush_low_priority();
        debug!(
            "🚪 {} moved to instance {} (map {}) at {}",
            session.character_name(),
            instance.id(),
            instance.map_id(),
            position
        );
        Ok(())
    }
}
