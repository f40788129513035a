//! # Core Type Definitions
//!
//! Fundamental identifier and value types used throughout the world server.
//! Wrapper types keep the many numeric ids in this domain from being confused
//! with each other (a `CharacterId` is not a `GroupId`), and every id that
//! crosses a process boundary is serializable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a character in the game world.
///
/// Characters are durable: their ids come from the persistence layer and
/// remain stable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub i64);

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a map definition (the static geometry/template a map
/// instance is built from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub i16);

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-unique identifier for one live map instance.
///
/// Generated with UUID v4 on instance creation and never reused, even after
/// the instance is removed. This is what makes a disposed instance
/// unreachable: no later instance can ever collide with its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapInstanceId(pub Uuid);

impl MapInstanceId {
    /// Allocates a fresh, never-before-used instance id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MapInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MapInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a transient party grouping.
///
/// Allocated from a strictly increasing counter starting at 1; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a raid grouping. Same allocation rules as [`GroupId`],
/// from an independent counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaidId(pub i64);

impl std::fmt::Display for RaidId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a family (the persistent social guild structure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyId(pub i64);

impl std::fmt::Display for FamilyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle/usage category of a map instance.
///
/// The kind decides revive policy, whether stored coordinates are updated on
/// entry, and how the instance is created and torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapInstanceKind {
    /// The single long-lived instance of a map definition, loaded at boot.
    Persistent,
    /// An on-demand instance with an independent lifecycle.
    Generated,
    /// A challenge run with a life budget and a countdown clock.
    TimedChallenge,
    /// A PvP arena instance.
    Arena,
}

/// A cell position on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i16,
    pub y: i16,
}

impl Coordinates {
    pub fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn instance_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| MapInstanceId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn ids_display_their_inner_value() {
        assert_eq!(CharacterId(42).to_string(), "42");
        assert_eq!(MapId(7).to_string(), "7");
        assert_eq!(Coordinates::new(3, -4).to_string(), "(3, -4)");
    }
}
