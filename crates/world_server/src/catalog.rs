//! Boot-time catalog caches.
//!
//! Everything in here is loaded once from the persistence gateway during
//! startup and then read-only for the life of the process, except the mail
//! cache which a scheduler task reloads periodically.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use world_core::{
    CharacterId, DropDefinition, ItemDefinition, MailRecord, MapDefinition, NpcDefinition,
    PersistenceGateway, RecipeDefinition, ShopDefinition, ShopItemRecord, ShopSkillRecord,
    SkillDefinition, TeleporterRecord,
};

use crate::error::WorldError;

/// Immutable game content loaded at boot, plus the periodically reloaded
/// mail cache.
pub struct GameCatalog {
    maps: HashMap<world_core::MapId, MapDefinition>,
    items: HashMap<i64, ItemDefinition>,
    skills: HashMap<i64, SkillDefinition>,
    npc_definitions: HashMap<i64, NpcDefinition>,
    /// Rows with a monster id, grouped by that monster.
    monster_drops: HashMap<i64, Vec<DropDefinition>>,
    /// Rows without a monster id: the general drop pool.
    general_drops: Vec<DropDefinition>,
    recipes: Vec<RecipeDefinition>,
    shops: Vec<ShopDefinition>,
    shop_items: Vec<ShopItemRecord>,
    shop_skills: Vec<ShopSkillRecord>,
    teleporters: Vec<TeleporterRecord>,
    mail: RwLock<Vec<MailRecord>>,
}

impl GameCatalog {
    /// Loads every catalog table through the gateway.
    ///
    /// Zero map definitions is fatal: a world node with no maps cannot
    /// place a single character.
    pub async fn load(gateway: &Arc<dyn PersistenceGateway>) -> Result<Self, WorldError> {
        let maps: HashMap<_, _> = gateway
            .load_maps()
            .await?
            .into_iter()
            .map(|m| (m.map_id, m))
            .collect();
        if maps.is_empty() {
            return Err(WorldError::NoMapDefinitions);
        }
        info!("🗺️ Loaded {} map definitions", maps.len());

        let items: HashMap<_, _> = gateway
            .load_items()
            .await?
            .into_iter()
            .map(|i| (i.item_id, i))
            .collect();
        info!("🎒 Loaded {} items", items.len());

        let skills: HashMap<_, _> = gateway
            .load_skills()
            .await?
            .into_iter()
            .map(|s| (s.skill_id, s))
            .collect();
        info!("✨ Loaded {} skills", skills.len());

        let npc_definitions: HashMap<_, _> = gateway
            .load_npc_definitions()
            .await?
            .into_iter()
            .map(|n| (n.npc_id, n))
            .collect();
        info!("🧌 Loaded {} npc definitions", npc_definitions.len());

        let mut monster_drops: HashMap<i64, Vec<DropDefinition>> = HashMap::new();
        let mut general_drops = Vec::new();
        let mut drop_count = 0usize;
        for drop in gateway.load_drops().await? {
            drop_count += 1;
            match drop.monster_id {
                Some(monster_id) => monster_drops.entry(monster_id).or_default().push(drop),
                None => general_drops.push(drop),
            }
        }
        info!(
            "💎 Loaded {} drops ({} in the general pool)",
            drop_count,
            general_drops.len()
        );

        let recipes = gateway.load_recipes().await?;
        info!("⚗️ Loaded {} recipes", recipes.len());
        let shops = gateway.load_shops().await?;
        let shop_items = gateway.load_shop_items().await?;
        let shop_skills = gateway.load_shop_skills().await?;
        info!(
            "🏪 Loaded {} shops ({} item lines, {} skill lines)",
            shops.len(),
            shop_items.len(),
            shop_skills.len()
        );
        let teleporters = gateway.load_teleporters().await?;
        info!("🌀 Loaded {} teleporters", teleporters.len());

        let mail = gateway.load_mail().await?;
        info!("📬 Loaded {} mail rows", mail.len());

        Ok(Self {
            maps,
            items,
            skills,
            npc_definitions,
            monster_drops,
            general_drops,
            recipes,
            shops,
            shop_items,
            shop_skills,
            teleporters,
            mail: RwLock::new(mail),
        })
    }

    pub fn map(&self, map_id: world_core::MapId) -> Option<&MapDefinition> {
        self.maps.get(&map_id)
    }

    pub fn maps(&self) -> impl Iterator<Item = &MapDefinition> {
        self.maps.values()
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn item(&self, item_id: i64) -> Option<&ItemDefinition> {
        self.items.get(&item_id)
    }

    pub fn skill(&self, skill_id: i64) -> Option<&SkillDefinition> {
        self.skills.get(&skill_id)
    }

    pub fn npc_definition(&self, npc_id: i64) -> Option<&NpcDefinition> {
        self.npc_definitions.get(&npc_id)
    }

    pub fn drops_for_monster(&self, monster_id: i64) -> &[DropDefinition] {
        self.monster_drops
            .get(&monster_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn general_drops(&self) -> &[DropDefinition] {
        &self.general_drops
    }

    pub fn recipes_for_placement(&self, npc_placement_id: i64) -> Vec<&RecipeDefinition> {
        self.recipes
            .iter()
            .filter(|r| r.npc_placement_id == npc_placement_id)
            .collect()
    }

    pub fn shops_for_placement(&self, npc_placement_id: i64) -> Vec<&ShopDefinition> {
        self.shops
            .iter()
            .filter(|s| s.npc_placement_id == npc_placement_id)
            .collect()
    }

    pub fn shop_items(&self, shop_id: i64) -> Vec<&ShopItemRecord> {
        self.shop_items
            .iter()
            .filter(|i| i.shop_id == shop_id)
            .collect()
    }

    pub fn shop_skills(&self, shop_id: i64) -> Vec<&ShopSkillRecord> {
        self.shop_skills
            .iter()
            .filter(|s| s.shop_id == shop_id)
            .collect()
    }

    pub fn teleporters(&self) -> &[TeleporterRecord] {
        &self.teleporters
    }

    /// Unread mail count for one character, from the cached copy.
    pub async fn unread_mail(&self, character_id: CharacterId) -> usize {
        self.mail
            .read()
            .await
            .iter()
            .filter(|m| m.recipient_id == character_id && !m.is_read)
            .count()
    }

    /// Replaces the mail cache wholesale. Called by the periodic reload task.
    pub async fn replace_mail(&self, rows: Vec<MailRecord>) {
        *self.mail.write().await = rows;
    }
}

impl std::fmt::Debug for GameCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameCatalog")
            .field("maps", &self.maps.len())
            .field("items", &self.items.len())
            .field("skills", &self.skills.len())
            .field("npc_definitions", &self.npc_definitions.len())
            .finish_non_exhaustive()
    }
}
