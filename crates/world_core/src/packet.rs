//! Typed packets exchanged with connected sessions.
//!
//! Wire-level encoding is out of scope for the world core: the transport
//! layer turns these values into whatever the client protocol needs. The core
//! only decides *what* to tell a session, never how the bytes look.

use crate::types::{CharacterId, Coordinates, GroupId, MapId};
use serde::{Deserialize, Serialize};

/// One roster line in a group/raid listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub character_id: CharacterId,
    pub name: String,
    pub level: u8,
    pub is_leader: bool,
}

/// A message from the server core to one session.
///
/// Variants map to the resynchronization/notice set the orchestrator emits;
/// anything combat- or economy-shaped lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Identity block sent on (re-)entering a map instance.
    CharacterInfo {
        character_id: CharacterId,
        name: String,
        level: u8,
    },
    /// Current/maximum health and resource values.
    Stats {
        hp: i32,
        hp_capacity: i32,
        mp: i32,
        mp_capacity: i32,
    },
    /// Movement/interaction condition flags.
    Condition { can_move: bool, can_attack: bool },
    /// Equipment summary for the resynchronization set.
    Equipment { item_ids: Vec<i64> },
    /// The map the session is now standing on.
    MapEntered {
        map_id: MapId,
        position: Coordinates,
    },
    /// Another entity became visible on the current instance.
    EntityIn {
        character_id: CharacterId,
        name: String,
        position: Coordinates,
    },
    /// An entity left the current instance.
    EntityOut { character_id: CharacterId },
    /// The receiving session itself is leaving its instance.
    MapOut,
    /// Full party roster; `group_id` of `None` clears the client's list.
    GroupRoster {
        group_id: Option<GroupId>,
        members: Vec<RosterEntry>,
    },
    /// Lightweight periodic party status pulse.
    GroupPulse { entries: Vec<RosterEntry> },
    /// A modal dialog prompt (already localized).
    Dialog { prompt: String },
    /// A plain localized notice.
    Message { text: String },
    /// An informational popup.
    Info { text: String },
    /// Chat-channel text with a display color.
    Say { text: String, color: u8 },
    /// A visual effect anchored on an entity.
    Effect {
        character_id: CharacterId,
        effect_id: i32,
    },
    /// Remaining seconds on the instance countdown clock.
    ClockSync { remaining_secs: u64 },
    /// Unread mail indicator.
    MailNotice { unread: usize },
    /// In-place reposition on the current instance.
    Teleport { position: Coordinates },
    /// A character came back to life.
    Revived { character_id: CharacterId },
    /// Minimap marker update for the receiving session.
    MinimapPosition { position: Coordinates },
}

/// Selects which occupants of a map instance receive a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastFilter {
    /// Every registered session.
    Everyone,
    /// Every registered session except the named character.
    AllExcept(CharacterId),
    /// Only the named character.
    Only(CharacterId),
}

impl BroadcastFilter {
    /// Whether a session owned by `character_id` should receive the message.
    pub fn matches(&self, character_id: CharacterId) -> bool {
        match self {
            BroadcastFilter::Everyone => true,
            BroadcastFilter::AllExcept(excluded) => *excluded != character_id,
            BroadcastFilter::Only(target) => *target == character_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matching() {
        let a = CharacterId(1);
        let b = CharacterId(2);
        assert!(BroadcastFilter::Everyone.matches(a));
        assert!(!BroadcastFilter::AllExcept(a).matches(a));
        assert!(BroadcastFilter::AllExcept(a).matches(b));
        assert!(BroadcastFilter::Only(a).matches(a));
        assert!(!BroadcastFilter::Only(a).matches(b));
    }
}
