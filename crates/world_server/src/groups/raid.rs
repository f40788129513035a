//! Raid groupings: larger rosters with a designated leader.

use std::sync::{Arc, Mutex};
use world_core::{CharacterId, Packet, RaidId, RosterEntry};

use crate::session::Session;

/// A raid: a member roster plus a designated leader who is not necessarily
/// first in the roster.
pub struct Raid {
    id: RaidId,
    members: Mutex<Vec<Arc<Session>>>,
    leader: Mutex<Option<CharacterId>>,
}

impl Raid {
    pub fn new(id: RaidId) -> Self {
        Self {
            id,
            members: Mutex::new(Vec::new()),
            leader: Mutex::new(None),
        }
    }

    pub fn id(&self) -> RaidId {
        self.id
    }

    /// Adds a member; the first member becomes leader.
    pub fn add_member(&self, session: Arc<Session>) -> bool {
        let mut members = self.members.lock().expect("raid members poisoned");
        if members
            .iter()
            .any(|m| m.character_id() == session.character_id())
        {
            return false;
        }
        let mut leader = self.leader.lock().expect("raid leader poisoned");
        if leader.is_none() {
            *leader = Some(session.character_id());
        }
        members.push(session);
        true
    }

    /// Removes a member. Returns the removed session and whether they led
    /// the raid.
    pub fn remove_member(&self, character_id: CharacterId) -> Option<(Arc<Session>, bool)> {
        let mut members = self.members.lock().expect("raid members poisoned");
        let index = members
            .iter()
            .position(|m| m.character_id() == character_id)?;
        let removed = members.remove(index);
        let was_leader = *self.leader.lock().expect("raid leader poisoned") == Some(character_id);
        Some((removed, was_leader))
    }

    pub fn leader_id(&self) -> Option<CharacterId> {
        *self.leader.lock().expect("raid leader poisoned")
    }

    pub fn set_leader(&self, character_id: CharacterId) {
        *self.leader.lock().expect("raid leader poisoned") = Some(character_id);
    }

    pub fn contains(&self, character_id: CharacterId) -> bool {
        self.members
            .lock()
            .expect("raid members poisoned")
            .iter()
            .any(|m| m.character_id() == character_id)
    }

    pub fn len(&self) -> usize {
        self.members.lock().expect("raid members poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn members(&self) -> Vec<Arc<Session>> {
        self.members.lock().expect("raid members poisoned").clone()
    }

    /// Builds the raid listing, reading each member's live level.
    pub async fn roster(&self) -> Vec<RosterEntry> {
        let leader = self.leader_id();
        let members = self.members();
        let mut entries = Vec::with_capacity(members.len());
        for member in members {
            let character = member.character().await;
            entries.push(RosterEntry {
                character_id: character.id,
                name: character.name.clone(),
                level: character.level,
                is_leader: leader == Some(character.id),
            });
        }
        entries
    }

    /// Sends `packet` to every raid member.
    pub fn broadcast(&self, packet: Packet) {
        for member in self.members() {
            member.send(packet.clone());
        }
    }
}

impl std::fmt::Debug for Raid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raid")
            .field("id", &self.id)
            .field("members", &self.len())
            .field("leader", &self.leader_id())
            .finish()
    }
}
