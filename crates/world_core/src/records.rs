//! Durable-store record types.
//!
//! Plain data mirrored from the persistence gateway. The orchestrator never
//! mutates these in place; refreshed copies replace stale ones wholesale.

use crate::types::{CharacterId, FamilyId, MapId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static definition of a map (template for map instances).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefinition {
    pub map_id: MapId,
    pub name: String,
    pub width: i16,
    pub height: i16,
    pub music: i16,
    pub shops_allowed: bool,
}

/// Item catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub item_id: i64,
    pub name: String,
}

/// Skill catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub skill_id: i64,
    pub name: String,
}

/// NPC/monster species definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcDefinition {
    pub npc_id: i64,
    pub name: String,
    pub level: u8,
}

/// A monster spawn placed on a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterPlacement {
    pub placement_id: i64,
    pub npc_id: i64,
    pub map_id: MapId,
    pub x: i16,
    pub y: i16,
}

/// A non-hostile NPC placed on a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcPlacement {
    pub placement_id: i64,
    pub npc_id: i64,
    pub map_id: MapId,
    pub x: i16,
    pub y: i16,
}

/// A portal connecting two maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalDefinition {
    pub portal_id: i64,
    pub map_id: MapId,
    pub x: i16,
    pub y: i16,
    pub destination_map: MapId,
    pub destination_x: i16,
    pub destination_y: i16,
}

/// A drop table row; `monster_id` of `None` marks the general drop pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropDefinition {
    pub item_id: i64,
    pub monster_id: Option<i64>,
    pub chance: u32,
    pub amount: u16,
}

/// A crafting recipe offered by a map NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDefinition {
    pub recipe_id: i64,
    pub npc_placement_id: i64,
    pub item_id: i64,
    pub amount: u16,
}

/// A shop attached to a map NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopDefinition {
    pub shop_id: i64,
    pub npc_placement_id: i64,
    pub name: String,
}

/// One item line in a shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItemRecord {
    pub shop_id: i64,
    pub item_id: i64,
    pub price: i64,
}

/// One skill line in a shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSkillRecord {
    pub shop_id: i64,
    pub skill_id: i64,
    pub price: i64,
}

/// A teleporter service offered by a map NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleporterRecord {
    pub teleporter_id: i64,
    pub npc_placement_id: i64,
    pub map_id: MapId,
    pub x: i16,
    pub y: i16,
}

/// A bazaar listing, joined with seller name and item reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BazaarListing {
    pub listing_id: i64,
    pub seller_id: CharacterId,
    pub seller_name: String,
    pub item_id: i64,
    pub price: i64,
    pub amount: u16,
}

/// Rank of a character inside a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FamilyRank {
    Head,
    Deputy,
    Member,
}

/// One family member row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub character_id: CharacterId,
    pub rank: FamilyRank,
}

/// A family with its member roster (loaded by parent id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub family_id: FamilyId,
    pub name: String,
    pub members: Vec<FamilyMember>,
}

/// Relation between two characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    Friend,
    Blocked,
    Spouse,
}

/// One character-relation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    pub relation_id: i64,
    pub character_id: CharacterId,
    pub related_id: CharacterId,
    pub kind: RelationKind,
}

/// A penalty (ban/mute) log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyRecord {
    pub penalty_id: i64,
    pub account_name: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

/// A mail row as cached by the periodic mail reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailRecord {
    pub mail_id: i64,
    pub recipient_id: CharacterId,
    pub title: String,
    pub is_read: bool,
}

/// Where a character reappears after a revive on a persistent-world map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RespawnAnchor {
    pub map_id: MapId,
    pub x: i16,
    pub y: i16,
}

/// The durable snapshot of a character, as loaded and saved through the
/// persistence gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub character_id: CharacterId,
    pub account_name: String,
    pub name: String,
    pub level: u8,
    pub job_level: u8,
    pub hp: i32,
    pub mp: i32,
    pub gold: i64,
    pub dignity: i32,
    pub reputation: i64,
    pub map_id: MapId,
    pub map_x: i16,
    pub map_y: i16,
    pub family_id: Option<FamilyId>,
    pub respawn: RespawnAnchor,
}
