//! The persistence gateway contract.
//!
//! The world server never talks to a database directly; everything durable
//! goes through this trait. Load methods come in three shapes, mirroring the
//! store's access patterns: load-all (boot-time cache fill), load-by-id
//! (refresh round trips), and load-by-parent (map content, family rosters).

use crate::records::{
    BazaarListing, CharacterRecord, DropDefinition, FamilyRecord, ItemDefinition, MailRecord,
    MapDefinition, MonsterPlacement, NpcDefinition, NpcPlacement, PenaltyRecord, PortalDefinition,
    RecipeDefinition, RelationRecord, ShopDefinition, ShopItemRecord, ShopSkillRecord,
    SkillDefinition, TeleporterRecord,
};
use crate::types::{CharacterId, FamilyId, MapId};
use async_trait::async_trait;

/// Errors surfaced by a persistence gateway implementation.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backing store could not be reached or read.
    #[error("storage error: {0}")]
    Storage(String),
    /// A stored row could not be decoded.
    #[error("corrupt record in {entity}: {reason}")]
    Corrupt { entity: String, reason: String },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Access to the durable store shared by all cooperating server nodes.
///
/// Implementations must be safe to call concurrently; the orchestrator issues
/// loads from request handlers, scheduler tasks, and the sync-bridge receive
/// loop at the same time.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    // Boot-time catalog loads.
    async fn load_maps(&self) -> PersistenceResult<Vec<MapDefinition>>;
    async fn load_items(&self) -> PersistenceResult<Vec<ItemDefinition>>;
    async fn load_skills(&self) -> PersistenceResult<Vec<SkillDefinition>>;
    async fn load_npc_definitions(&self) -> PersistenceResult<Vec<NpcDefinition>>;
    async fn load_drops(&self) -> PersistenceResult<Vec<DropDefinition>>;
    async fn load_recipes(&self) -> PersistenceResult<Vec<RecipeDefinition>>;
    async fn load_shops(&self) -> PersistenceResult<Vec<ShopDefinition>>;
    async fn load_shop_items(&self) -> PersistenceResult<Vec<ShopItemRecord>>;
    async fn load_shop_skills(&self) -> PersistenceResult<Vec<ShopSkillRecord>>;
    async fn load_teleporters(&self) -> PersistenceResult<Vec<TeleporterRecord>>;
    async fn load_mail(&self) -> PersistenceResult<Vec<MailRecord>>;

    // Per-map content loads issued when a map instance is created.
    async fn load_monster_placements(&self, map_id: MapId)
        -> PersistenceResult<Vec<MonsterPlacement>>;
    async fn load_npc_placements(&self, map_id: MapId) -> PersistenceResult<Vec<NpcPlacement>>;
    async fn load_portals(&self, map_id: MapId) -> PersistenceResult<Vec<PortalDefinition>>;

    // Mirror loads: all rows at boot, single rows on refresh. A `None`
    // by-id result means the durable store has no such row any more.
    async fn load_bazaar(&self) -> PersistenceResult<Vec<BazaarListing>>;
    async fn load_bazaar_by_id(&self, listing_id: i64) -> PersistenceResult<Option<BazaarListing>>;
    async fn load_families(&self) -> PersistenceResult<Vec<FamilyRecord>>;
    async fn load_family_by_id(&self, family_id: FamilyId)
        -> PersistenceResult<Option<FamilyRecord>>;
    async fn load_relations(&self) -> PersistenceResult<Vec<RelationRecord>>;
    async fn load_relation_by_id(&self, relation_id: i64)
        -> PersistenceResult<Option<RelationRecord>>;
    async fn load_penalties(&self) -> PersistenceResult<Vec<PenaltyRecord>>;
    async fn load_penalty_by_id(&self, penalty_id: i64)
        -> PersistenceResult<Option<PenaltyRecord>>;

    // Character persistence.
    async fn load_character(&self, character_id: CharacterId)
        -> PersistenceResult<Option<CharacterRecord>>;
    async fn save_character(&self, record: &CharacterRecord) -> PersistenceResult<()>;
}
