//! Transient party groupings.

use std::sync::{Arc, Mutex};
use world_core::{CharacterId, GroupId, Packet, RosterEntry};

use crate::session::Session;

/// Maximum members a party can hold.
pub const GROUP_CAPACITY: usize = 3;

/// Lifecycle of a group. Below [`GROUP_CAPACITY`] members after forming the
/// group is closing, never a steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Forming,
    Active,
    Dissolving,
}

/// An ordered party of up to three sessions; index 0 is the leader.
pub struct Group {
    id: GroupId,
    members: Mutex<Vec<Arc<Session>>>,
    state: Mutex<GroupState>,
}

impl Group {
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            members: Mutex::new(Vec::new()),
            state: Mutex::new(GroupState::Forming),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn state(&self) -> GroupState {
        *self.state.lock().expect("group state poisoned")
    }

    pub fn set_state(&self, state: GroupState) {
        *self.state.lock().expect("group state poisoned") = state;
    }

    /// Adds a member at the end of the roster. Rejects duplicates, a full
    /// group, and a dissolving group.
    pub fn add_member(&self, session: Arc<Session>) -> bool {
        if self.state() == GroupState::Dissolving {
            return false;
        }
        let mut members = self.members.lock().expect("group members poisoned");
        if members.len() >= GROUP_CAPACITY
            || members
                .iter()
                .any(|m| m.character_id() == session.character_id())
        {
            return false;
        }
        members.push(session);
        if members.len() == GROUP_CAPACITY {
            self.set_state(GroupState::Active);
        }
        true
    }

    /// Removes a member, preserving roster order. Returns the removed
    /// session and whether they were the leader.
    pub fn remove_member(&self, character_id: CharacterId) -> Option<(Arc<Session>, bool)> {
        let mut members = self.members.lock().expect("group members poisoned");
        let index = members
            .iter()
            .position(|m| m.character_id() == character_id)?;
        let removed = members.remove(index);
        Some((removed, index == 0))
    }

    pub fn contains(&self, character_id: CharacterId) -> bool {
        self.members
            .lock()
            .expect("group members poisoned")
            .iter()
            .any(|m| m.character_id() == character_id)
    }

    pub fn len(&self) -> usize {
        self.members.lock().expect("group members poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= GROUP_CAPACITY
    }

    /// Roster-ordered snapshot of the member sessions.
    pub fn members(&self) -> Vec<Arc<Session>> {
        self.members.lock().expect("group members poisoned").clone()
    }

    pub fn leader(&self) -> Option<Arc<Session>> {
        self.members
            .lock()
            .expect("group members poisoned")
            .first()
            .cloned()
    }

    /// Builds the roster listing, reading each member's live level.
    pub async fn roster(&self) -> Vec<RosterEntry> {
        let members = self.members();
        let mut entries = Vec::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            let character = member.character().await;
            entries.push(RosterEntry {
                character_id: character.id,
                name: character.name.clone(),
                level: character.level,
                is_leader: index == 0,
            });
        }
        entries
    }

    /// Sends the current roster to every member.
    pub async fn broadcast_roster(&self) {
        let entries = self.roster().await;
        for member in self.members() {
            member.send(Packet::GroupRoster {
                group_id: Some(self.id),
                members: entries.clone(),
            });
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("members", &self.len())
            .field("state", &self.state())
            .finish()
    }
}
