//! Cross-node notification types.
//!
//! Cooperating server nodes share one durable store and one broadcast
//! channel. These types are the envelopes that travel on that channel: cache
//! refresh notices, session kick requests, and routed chat messages. The
//! channel may be multi-tenant, so every envelope carries the node group it
//! originates from and receivers filter on it.

use crate::types::{CharacterId, FamilyId};
use serde::{Deserialize, Serialize};

/// The kind of cached mirror a refresh notice targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Bazaar,
    Family,
    Relation,
    PenaltyLog,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Bazaar => "bazaar",
            ResourceKind::Family => "family",
            ResourceKind::Relation => "relation",
            ResourceKind::PenaltyLog => "penalty-log",
        };
        f.write_str(name)
    }
}

/// "Row X of kind K changed in the durable store; refresh your mirror."
///
/// Published by whichever node made the change; every subscriber (including
/// the publisher itself) receives it and reloads the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncNotice {
    pub kind: ResourceKind,
    pub resource_id: i64,
    pub origin_group: String,
}

/// Discriminates how a cross-node chat message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Direct whisper to one character by name.
    Whisper,
    /// Server-wide administrator shout.
    Shout,
    /// Private system text to one character, no chat framing.
    Private,
    /// Family chat line, annotated with the origin channel when it differs.
    FamilyChat,
    /// Family-wide system broadcast.
    FamilyBroadcast,
}

/// Who a cross-node message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// A single character, found by name on whichever node hosts them.
    Name(String),
    /// Every connected member of a family.
    Family(FamilyId),
    /// Everyone on the receiving node.
    Everyone,
}

/// A chat/notice message routed between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossNodeEnvelope {
    /// Node group the message belongs to; `*` means every group.
    pub origin_group: String,
    /// Display name of the sending character.
    pub sender: String,
    pub recipient: Recipient,
    /// Already-rendered message text.
    pub text: String,
    /// Channel id of the originating node, used to annotate cross-channel
    /// delivery.
    pub origin_channel: u16,
    pub kind: MessageKind,
}

impl CrossNodeEnvelope {
    /// Whether a node serving `group` should process this envelope.
    pub fn addressed_to_group(&self, group: &str) -> bool {
        self.origin_group == "*" || self.origin_group == group
    }
}

/// Selects sessions to forcibly disconnect. Empty filters match nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKickFilter {
    /// Match by character id, if set.
    pub character_id: Option<CharacterId>,
    /// Match by account name, if set.
    pub account_name: Option<String>,
}

impl SessionKickFilter {
    pub fn by_character(character_id: CharacterId) -> Self {
        Self {
            character_id: Some(character_id),
            account_name: None,
        }
    }

    pub fn by_account(account_name: impl Into<String>) -> Self {
        Self {
            character_id: None,
            account_name: Some(account_name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.character_id.is_none() && self.account_name.is_none()
    }
}
