//! Session tracking and character state.
//!
//! This module provides the registry of connected sessions, the in-memory
//! character state each session owns, and the capability surface the rest of
//! the orchestrator uses: queued packet sends, transition/revive guard flags,
//! and the current map-instance reference.
//!
//! Sends are non-blocking queue pushes into the session's outbound channel;
//! the transport drains that channel on its own task, so no orchestrator lock
//! is ever held across network I/O.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use world_core::{
    CharacterId, CharacterRecord, Coordinates, FamilyId, MapId, MapInstanceId, Packet,
    RespawnAnchor,
};

/// The closed set of character fields readable/writable by name-agnostic
/// callers (admin commands, cross-node tooling).
///
/// Replaces stringly-keyed reflection: the compiler checks every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterField {
    Level,
    JobLevel,
    Hp,
    Mp,
    Gold,
    Dignity,
    Reputation,
}

/// An inventory item that disappears at a fixed time.
#[derive(Debug, Clone)]
pub struct TransientItem {
    pub item_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Live, mutable character state owned by one session.
#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub account_name: String,
    pub name: String,
    pub level: u8,
    pub job_level: u8,
    pub hp: i32,
    pub mp: i32,
    pub gold: i64,
    pub dignity: i32,
    pub reputation: i64,
    /// Stored coordinates: the persistent-world position saved to the
    /// durable store, updated only when entering a persistent instance.
    pub map_id: MapId,
    pub map_x: i16,
    pub map_y: i16,
    /// Live position on the current instance.
    pub position: Coordinates,
    pub family_id: Option<FamilyId>,
    pub respawn: RespawnAnchor,
    pub mounted: bool,
    pub buffs: Vec<i64>,
    pub shop_open: bool,
    pub trading: bool,
    pub whisper_blocked: bool,
    pub transient_items: Vec<TransientItem>,
}

impl Character {
    pub fn from_record(record: CharacterRecord) -> Self {
        let position = Coordinates::new(record.map_x, record.map_y);
        Self {
            id: record.character_id,
            account_name: record.account_name,
            name: record.name,
            level: record.level,
            job_level: record.job_level,
            hp: record.hp,
            mp: record.mp,
            gold: record.gold,
            dignity: record.dignity,
            reputation: record.reputation,
            map_id: record.map_id,
            map_x: record.map_x,
            map_y: record.map_y,
            position,
            family_id: record.family_id,
            respawn: record.respawn,
            mounted: false,
            buffs: Vec::new(),
            shop_open: false,
            trading: false,
            whisper_blocked: false,
            transient_items: Vec::new(),
        }
    }

    /// Snapshot for the persistence gateway.
    pub fn to_record(&self) -> CharacterRecord {
        CharacterRecord {
            character_id: self.id,
            account_name: self.account_name.clone(),
            name: self.name.clone(),
            level: self.level,
            job_level: self.job_level,
            hp: self.hp,
            mp: self.mp,
            gold: self.gold,
            dignity: self.dignity,
            reputation: self.reputation,
            map_id: self.map_id,
            map_x: self.map_x,
            map_y: self.map_y,
            family_id: self.family_id,
            respawn: self.respawn,
        }
    }

    /// Full health load-out for the current level.
    pub fn hp_capacity(&self) -> i32 {
        200 + 30 * i32::from(self.level)
    }

    /// Full resource load-out for the current level.
    pub fn mp_capacity(&self) -> i32 {
        100 + 20 * i32::from(self.level)
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Reads a field through the closed accessor table.
    pub fn field(&self, field: CharacterField) -> i64 {
        match field {
            CharacterField::Level => i64::from(self.level),
            CharacterField::JobLevel => i64::from(self.job_level),
            CharacterField::Hp => i64::from(self.hp),
            CharacterField::Mp => i64::from(self.mp),
            CharacterField::Gold => self.gold,
            CharacterField::Dignity => i64::from(self.dignity),
            CharacterField::Reputation => self.reputation,
        }
    }

    /// Writes a field through the closed accessor table.
    pub fn set_field(&mut self, field: CharacterField, value: i64) {
        match field {
            CharacterField::Level => self.level = value.clamp(1, u8::MAX as i64) as u8,
            CharacterField::JobLevel => self.job_level = value.clamp(0, u8::MAX as i64) as u8,
            CharacterField::Hp => self.hp = value.clamp(0, i32::MAX as i64) as i32,
            CharacterField::Mp => self.mp = value.clamp(0, i32::MAX as i64) as i32,
            CharacterField::Gold => self.gold = value,
            CharacterField::Dignity => {
                self.dignity = value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
            }
            CharacterField::Reputation => self.reputation = value,
        }
    }

    /// Drops items whose validity expired, returning their ids.
    pub fn expire_items(&mut self, now: DateTime<Utc>) -> Vec<i64> {
        let mut expired = Vec::new();
        self.transient_items.retain(|item| {
            if item.expires_at <= now {
                expired.push(item.item_id);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Current stat packet for the resynchronization set.
    pub fn stats_packet(&self) -> Packet {
        Packet::Stats {
            hp: self.hp,
            hp_capacity: self.hp_capacity(),
            mp: self.mp,
            mp_capacity: self.mp_capacity(),
        }
    }

    pub fn condition_packet(&self) -> Packet {
        Packet::Condition {
            can_move: !self.is_dead(),
            can_attack: !self.is_dead() && !self.mounted,
        }
    }
}

/// One connected player session.
///
/// The orchestrator treats this as a capability: send packets, read/write the
/// current map-instance reference, read character state. Connection lifecycle
/// belongs to the transport layer.
#[derive(Debug)]
pub struct Session {
    character_id: CharacterId,
    character_name: String,
    account_name: String,
    character: RwLock<Character>,
    outbound: mpsc::UnboundedSender<Packet>,
    low_priority: Mutex<VecDeque<Packet>>,
    current_instance: Mutex<Option<MapInstanceId>>,
    connected: AtomicBool,
    in_transition: AtomicBool,
    revive_pending: AtomicBool,
}

impl Session {
    pub fn new(record: CharacterRecord, outbound: mpsc::UnboundedSender<Packet>) -> Self {
        let character = Character::from_record(record);
        Self {
            character_id: character.id,
            character_name: character.name.clone(),
            account_name: character.account_name.clone(),
            character: RwLock::new(character),
            outbound,
            low_priority: Mutex::new(VecDeque::new()),
            current_instance: Mutex::new(None),
            connected: AtomicBool::new(true),
            in_transition: AtomicBool::new(false),
            revive_pending: AtomicBool::new(false),
        }
    }

    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub async fn character(&self) -> RwLockReadGuard<'_, Character> {
        self.character.read().await
    }

    pub async fn character_mut(&self) -> RwLockWriteGuard<'_, Character> {
        self.character.write().await
    }

    /// Queues one packet for delivery. Never blocks; a closed transport
    /// channel is logged and ignored.
    pub fn send(&self, packet: Packet) {
        if !self.is_connected() {
            return;
        }
        if self.outbound.send(packet).is_err() {
            debug!("📪 Dropping packet for disconnected session {}", self.character_id);
        }
    }

    pub fn send_many<I: IntoIterator<Item = Packet>>(&self, packets: I) {
        for packet in packets {
            self.send(packet);
        }
    }

    /// Queues a packet in the deferrable low-priority lane.
    pub fn send_low_priority(&self, packet: Packet) {
        self.low_priority
            .lock()
            .expect("low-priority queue poisoned")
            .push_back(packet);
    }

    /// Sends a packet that may safely wait out a map transition.
    ///
    /// While a transition is in flight the packet lands in the low-priority
    /// lane and is delivered after the resynchronization set; otherwise it
    /// goes straight out.
    pub fn send_deferrable(&self, packet: Packet) {
        if self.in_transition() {
            self.send_low_priority(packet);
        } else {
            self.send(packet);
        }
    }

    /// Drops everything still waiting in the low-priority lane. Called at the
    /// start of a map transition so stale notices never reach the new map.
    pub fn clear_low_priority_queue(&self) {
        self.low_priority
            .lock()
            .expect("low-priority queue poisoned")
            .clear();
    }

    /// Moves queued low-priority packets into the outbound channel.
    pub fn flush_low_priority(&self) {
        let drained: Vec<Packet> = {
            let mut queue = self
                .low_priority
                .lock()
                .expect("low-priority queue poisoned");
            queue.drain(..).collect()
        };
        self.send_many(drained);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Marks the session disconnected; further sends become no-ops.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn current_instance(&self) -> Option<MapInstanceId> {
        *self
            .current_instance
            .lock()
            .expect("current-instance lock poisoned")
    }

    pub fn set_current_instance(&self, instance: Option<MapInstanceId>) {
        *self
            .current_instance
            .lock()
            .expect("current-instance lock poisoned") = instance;
    }

    /// Claims the transition guard. Returns false if a transition for this
    /// session is already in flight.
    pub fn begin_transition(&self) -> bool {
        !self.in_transition.swap(true, Ordering::AcqRel)
    }

    pub fn end_transition(&self) {
        self.in_transition.store(false, Ordering::Release);
    }

    pub fn in_transition(&self) -> bool {
        self.in_transition.load(Ordering::Acquire)
    }

    /// Claims the revive-countdown guard. Returns false if a countdown for
    /// this character is already pending.
    pub fn begin_revive(&self) -> bool {
        !self.revive_pending.swap(true, Ordering::AcqRel)
    }

    pub fn end_revive(&self) {
        self.revive_pending.store(false, Ordering::Release);
    }

    pub fn revive_pending(&self) -> bool {
        self.revive_pending.load(Ordering::Acquire)
    }
}

/// Registry of all connected sessions, keyed by character id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_character: DashMap<CharacterId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            by_character: DashMap::new(),
        }
    }

    pub fn register(&self, session: Arc<Session>) {
        self.by_character.insert(session.character_id(), session);
    }

    pub fn unregister(&self, character_id: CharacterId) -> Option<Arc<Session>> {
        self.by_character.remove(&character_id).map(|(_, s)| s)
    }

    pub fn get(&self, character_id: CharacterId) -> Option<Arc<Session>> {
        self.by_character.get(&character_id).map(|s| s.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Session>> {
        self.by_character
            .iter()
            .find(|entry| entry.value().character_name() == name)
            .map(|entry| entry.value().clone())
    }

    /// Snapshot of every session still marked connected.
    pub fn connected(&self) -> Vec<Arc<Session>> {
        self.by_character
            .iter()
            .filter(|entry| entry.value().is_connected())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_character.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_character.is_empty()
    }
}
