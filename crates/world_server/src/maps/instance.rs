//! One live map instance: occupants, loaded content, broadcasts, triggers.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use world_core::{
    BroadcastFilter, CharacterId, MapDefinition, MapInstanceId, MapInstanceKind, MonsterPlacement,
    NpcPlacement, Packet, PersistenceGateway, PortalDefinition,
};

use crate::error::WorldError;
use crate::maps::bag::InstanceBag;
use crate::session::Session;

/// A packet set fired once per character on entering the instance.
#[derive(Debug)]
struct EntryTrigger {
    name: String,
    packets: Vec<Packet>,
    notified: HashSet<CharacterId>,
}

/// One live, independently running copy of a map.
///
/// Occupants are held in a concurrent map so join/leave and broadcast can
/// overlap; broadcast ordering within the instance is serialized by a
/// dedicated lock so occupants observe notices in issue order.
pub struct MapInstance {
    id: MapInstanceId,
    definition: MapDefinition,
    kind: MapInstanceKind,
    pvp: bool,
    bag: InstanceBag,
    monsters: RwLock<Vec<MonsterPlacement>>,
    npcs: RwLock<Vec<NpcPlacement>>,
    portals: RwLock<Vec<PortalDefinition>>,
    occupants: DashMap<CharacterId, Arc<Session>>,
    entry_triggers: Mutex<Vec<EntryTrigger>>,
    broadcast_lock: Mutex<()>,
    disposed: AtomicBool,
}

impl MapInstance {
    pub fn new(definition: MapDefinition, kind: MapInstanceKind, pvp: bool, bag: InstanceBag) -> Self {
        Self {
            id: MapInstanceId::new(),
            definition,
            kind,
            pvp,
            bag,
            monsters: RwLock::new(Vec::new()),
            npcs: RwLock::new(Vec::new()),
            portals: RwLock::new(Vec::new()),
            occupants: DashMap::new(),
            entry_triggers: Mutex::new(Vec::new()),
            broadcast_lock: Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> MapInstanceId {
        self.id
    }

    pub fn definition(&self) -> &MapDefinition {
        &self.definition
    }

    pub fn map_id(&self) -> world_core::MapId {
        self.definition.map_id
    }

    pub fn kind(&self) -> MapInstanceKind {
        self.kind
    }

    pub fn is_pvp(&self) -> bool {
        self.pvp
    }

    pub fn bag(&self) -> &InstanceBag {
        &self.bag
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Loads monsters, NPCs, and portals for this map and registers them
    /// active.
    pub async fn load_content(&self, gateway: &Arc<dyn PersistenceGateway>) -> Result<(), WorldError> {
        let map_id = self.definition.map_id;
        let monsters = gateway.load_monster_placements(map_id).await?;
        let npcs = gateway.load_npc_placements(map_id).await?;
        let portals = gateway.load_portals(map_id).await?;
        debug!(
            "🐾 Instance {} of map {}: {} monsters, {} npcs, {} portals",
            self.id,
            map_id,
            monsters.len(),
            npcs.len(),
            portals.len()
        );
        *self.monsters.write().expect("monster list poisoned") = monsters;
        *self.npcs.write().expect("npc list poisoned") = npcs;
        *self.portals.write().expect("portal list poisoned") = portals;
        Ok(())
    }

    pub fn monsters(&self) -> Vec<MonsterPlacement> {
        self.monsters.read().expect("monster list poisoned").clone()
    }

    pub fn npcs(&self) -> Vec<NpcPlacement> {
        self.npcs.read().expect("npc list poisoned").clone()
    }

    pub fn portals(&self) -> Vec<PortalDefinition> {
        self.portals.read().expect("portal list poisoned").clone()
    }

    /// Registers a session as an occupant. No-op on a disposed instance.
    pub fn register_session(&self, session: Arc<Session>) {
        if self.is_disposed() {
            return;
        }
        self.occupants.insert(session.character_id(), session);
    }

    pub fn unregister_session(&self, character_id: CharacterId) -> Option<Arc<Session>> {
        self.occupants.remove(&character_id).map(|(_, s)| s)
    }

    pub fn contains(&self, character_id: CharacterId) -> bool {
        self.occupants.contains_key(&character_id)
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Snapshot of the current occupant sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.occupants
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Sends `packet` to every occupant matched by `filter`.
    ///
    /// Serialized per instance so two broadcasts never interleave from the
    /// occupants' point of view. Sends themselves are queue pushes, so the
    /// lock is never held across I/O.
    pub fn broadcast(&self, packet: Packet, filter: BroadcastFilter) {
        if self.is_disposed() {
            return;
        }
        let _order = self.broadcast_lock.lock().expect("broadcast lock poisoned");
        for entry in self.occupants.iter() {
            if filter.matches(*entry.key()) {
                entry.value().send(packet.clone());
            }
        }
    }

    /// Registers a map-entry trigger fired once per character.
    pub fn add_entry_trigger(&self, name: impl Into<String>, packets: Vec<Packet>) {
        self.entry_triggers
            .lock()
            .expect("trigger list poisoned")
            .push(EntryTrigger {
                name: name.into(),
                packets,
                notified: HashSet::new(),
            });
    }

    /// Fires every entry trigger the character has not yet seen.
    ///
    /// Re-entering the same instance never re-fires a trigger: each trigger
    /// tracks the characters it already notified.
    pub fn run_entry_triggers(&self, session: &Session) {
        let mut triggers = self.entry_triggers.lock().expect("trigger list poisoned");
        for trigger in triggers.iter_mut() {
            if trigger.notified.insert(session.character_id()) {
                debug!(
                    "🔔 Entry trigger '{}' fired for {} on instance {}",
                    trigger.name,
                    session.character_name(),
                    self.id
                );
                session.send_many(trigger.packets.iter().cloned());
            }
        }
    }

    /// Marks the instance disposed and drops its occupant references.
    ///
    /// Callers must deregister the instance from the registry first so no new
    /// broadcast can reach it.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.occupants.clear();
        self.monsters.write().expect("monster list poisoned").clear();
        self.npcs.write().expect("npc list poisoned").clear();
        self.portals.write().expect("portal list poisoned").clear();
    }
}

impl std::fmt::Debug for MapInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapInstance")
            .field("id", &self.id)
            .field("map_id", &self.definition.map_id)
            .field("kind", &self.kind)
            .field("pvp", &self.pvp)
            .field("occupants", &self.occupants.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_session;
    use world_core::MapId;

    fn definition(map_id: i16) -> MapDefinition {
        MapDefinition {
            map_id: MapId(map_id),
            name: format!("map-{map_id}"),
            width: 100,
            height: 100,
            music: 0,
            shops_allowed: true,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broadcast_respects_filter() {
        let instance = MapInstance::new(
            definition(1),
            MapInstanceKind::Persistent,
            false,
            InstanceBag::default(),
        );
        let (ada, mut ada_rx) = test_session(1, "Ada");
        let (grace, mut grace_rx) = test_session(2, "Grace");
        instance.register_session(ada.clone());
        instance.register_session(grace);

        instance.broadcast(
            Packet::Message {
                text: "hi".to_string(),
            },
            BroadcastFilter::AllExcept(ada.character_id()),
        );

        assert!(ada_rx.try_recv().is_err());
        assert!(grace_rx.try_recv().is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entry_trigger_fires_once_per_character() {
        let instance = MapInstance::new(
            definition(1),
            MapInstanceKind::Generated,
            false,
            InstanceBag::default(),
        );
        instance.add_entry_trigger(
            "welcome",
            vec![Packet::Info {
                text: "welcome".to_string(),
            }],
        );

        let (ada, mut rx) = test_session(1, "Ada");
        instance.run_entry_triggers(&ada);
        instance.run_entry_triggers(&ada);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disposed_instance_drops_broadcasts() {
        let instance = MapInstance::new(
            definition(1),
            MapInstanceKind::Arena,
            true,
            InstanceBag::default(),
        );
        let (ada, mut rx) = test_session(1, "Ada");
        instance.register_session(ada);
        instance.dispose();
        instance.broadcast(
            Packet::Message {
                text: "late".to_string(),
            },
            BroadcastFilter::Everyone,
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(instance.occupant_count(), 0);
    }
}
