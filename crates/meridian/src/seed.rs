//! File-backed persistence gateway for standalone operation.
//!
//! A real deployment puts a database behind the gateway trait; a standalone
//! node reads its world from JSON seed files in a data directory instead.
//! Catalog files are read once at startup; characters are the only thing
//! written back.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;
use world_core::{
    BazaarListing, CharacterId, CharacterRecord, DropDefinition, FamilyId, FamilyRecord,
    ItemDefinition, MailRecord, MapDefinition, MapId, MonsterPlacement, NpcDefinition,
    NpcPlacement, PenaltyRecord, PersistenceError, PersistenceGateway, PersistenceResult,
    PortalDefinition, RecipeDefinition, RelationRecord, ShopDefinition, ShopItemRecord,
    ShopSkillRecord, SkillDefinition, TeleporterRecord,
};

/// Seed-file gateway: world content from JSON files under one directory.
#[derive(Debug)]
pub struct SeedGateway {
    data_dir: PathBuf,
    maps: Vec<MapDefinition>,
    items: Vec<ItemDefinition>,
    skills: Vec<SkillDefinition>,
    npc_definitions: Vec<NpcDefinition>,
    drops: Vec<DropDefinition>,
    recipes: Vec<RecipeDefinition>,
    shops: Vec<ShopDefinition>,
    shop_items: Vec<ShopItemRecord>,
    shop_skills: Vec<ShopSkillRecord>,
    teleporters: Vec<TeleporterRecord>,
    mail: Vec<MailRecord>,
    monster_placements: Vec<MonsterPlacement>,
    npc_placements: Vec<NpcPlacement>,
    portals: Vec<PortalDefinition>,
    bazaar: HashMap<i64, BazaarListing>,
    families: HashMap<FamilyId, FamilyRecord>,
    relations: HashMap<i64, RelationRecord>,
    penalties: HashMap<i64, PenaltyRecord>,
    characters: Mutex<HashMap<CharacterId, CharacterRecord>>,
}

impl SeedGateway {
    /// Reads every seed file under `data_dir`. Missing files are empty lists;
    /// an unreadable or undecodable file is an error.
    pub async fn load(data_dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let data_dir = data_dir.into();
        let maps = read_list(&data_dir, "maps.json").await?;
        info!(
            "📂 Seed data from {}: {} map definitions",
            data_dir.display(),
            maps.len()
        );
        let characters: Vec<CharacterRecord> = read_list(&data_dir, "characters.json").await?;
        let bazaar: Vec<BazaarListing> = read_list(&data_dir, "bazaar.json").await?;
        let families: Vec<FamilyRecord> = read_list(&data_dir, "families.json").await?;
        let relations: Vec<RelationRecord> = read_list(&data_dir, "relations.json").await?;
        let penalties: Vec<PenaltyRecord> = read_list(&data_dir, "penalties.json").await?;

        Ok(Self {
            maps,
            items: read_list(&data_dir, "items.json").await?,
            skills: read_list(&data_dir, "skills.json").await?,
            npc_definitions: read_list(&data_dir, "npc_definitions.json").await?,
            drops: read_list(&data_dir, "drops.json").await?,
            recipes: read_list(&data_dir, "recipes.json").await?,
            shops: read_list(&data_dir, "shops.json").await?,
            shop_items: read_list(&data_dir, "shop_items.json").await?,
            shop_skills: read_list(&data_dir, "shop_skills.json").await?,
            teleporters: read_list(&data_dir, "teleporters.json").await?,
            mail: read_list(&data_dir, "mail.json").await?,
            monster_placements: read_list(&data_dir, "monster_placements.json").await?,
            npc_placements: read_list(&data_dir, "npc_placements.json").await?,
            portals: read_list(&data_dir, "portals.json").await?,
            bazaar: bazaar.into_iter().map(|r| (r.listing_id, r)).collect(),
            families: families.into_iter().map(|r| (r.family_id, r)).collect(),
            relations: relations.into_iter().map(|r| (r.relation_id, r)).collect(),
            penalties: penalties.into_iter().map(|r| (r.penalty_id, r)).collect(),
            characters: Mutex::new(
                characters
                    .into_iter()
                    .map(|r| (r.character_id, r))
                    .collect(),
            ),
            data_dir,
        })
    }

    /// Writes a minimal starter world if the directory has no maps yet, so a
    /// freshly unpacked node can boot.
    pub async fn ensure_default_seed(data_dir: &Path) -> Result<(), PersistenceError> {
        let maps_path = data_dir.join("maps.json");
        if maps_path.exists() {
            return Ok(());
        }
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        let maps = vec![
            MapDefinition {
                map_id: MapId(1),
                name: "Harbor Town".to_string(),
                width: 120,
                height: 120,
                music: 1,
                shops_allowed: true,
            },
            MapDefinition {
                map_id: MapId(2),
                name: "Sunward Plains".to_string(),
                width: 160,
                height: 160,
                music: 2,
                shops_allowed: false,
            },
            MapDefinition {
                map_id: MapId(2006),
                name: "Arena".to_string(),
                width: 80,
                height: 80,
                music: 9,
                shops_allowed: false,
            },
            MapDefinition {
                map_id: MapId(2106),
                name: "Family Arena".to_string(),
                width: 80,
                height: 80,
                music: 9,
                shops_allowed: false,
            },
        ];
        write_list(data_dir, "maps.json", &maps).await?;
        info!("🌱 Wrote default seed world to {}", data_dir.display());
        Ok(())
    }
}

async fn read_list<T: DeserializeOwned>(
    dir: &Path,
    name: &str,
) -> Result<Vec<T>, PersistenceError> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| PersistenceError::Storage(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content).map_err(|e| PersistenceError::Corrupt {
        entity: name.to_string(),
        reason: e.to_string(),
    })
}

async fn write_list<T: Serialize>(
    dir: &Path,
    name: &str,
    rows: &[T],
) -> Result<(), PersistenceError> {
    let path = dir.join(name);
    let content = serde_json::to_string_pretty(rows)
        .map_err(|e| PersistenceError::Storage(e.to_string()))?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| PersistenceError::Storage(format!("{}: {e}", path.display())))
}

#[async_trait]
impl PersistenceGateway for SeedGateway {
    async fn load_maps(&self) -> PersistenceResult<Vec<MapDefinition>> {
        Ok(self.maps.clone())
    }

    async fn load_items(&self) -> PersistenceResult<Vec<ItemDefinition>> {
        Ok(self.items.clone())
    }

    async fn load_skills(&self) -> PersistenceResult<Vec<SkillDefinition>> {
        Ok(self.skills.clone())
    }

    async fn load_npc_definitions(&self) -> PersistenceResult<Vec<NpcDefinition>> {
        Ok(self.npc_definitions.clone())
    }

    async fn load_drops(&self) -> PersistenceResult<Vec<DropDefinition>> {
        Ok(self.drops.clone())
    }

    async fn load_recipes(&self) -> PersistenceResult<Vec<RecipeDefinition>> {
        Ok(self.recipes.clone())
    }

    async fn load_shops(&self) -> PersistenceResult<Vec<ShopDefinition>> {
        Ok(self.shops.clone())
    }

    async fn load_shop_items(&self) -> PersistenceResult<Vec<ShopItemRecord>> {
        Ok(self.shop_items.clone())
    }

    async fn load_shop_skills(&self) -> PersistenceResult<Vec<ShopSkillRecord>> {
        Ok(self.shop_skills.clone())
    }

    async fn load_teleporters(&self) -> PersistenceResult<Vec<TeleporterRecord>> {
        Ok(self.teleporters.clone())
    }

    async fn load_mail(&self) -> PersistenceResult<Vec<MailRecord>> {
        Ok(self.mail.clone())
    }

    async fn load_monster_placements(
        &self,
        map_id: MapId,
    ) -> PersistenceResult<Vec<MonsterPlacement>> {
        Ok(self
            .monster_placements
            .iter()
            .filter(|m| m.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn load_npc_placements(&self, map_id: MapId) -> PersistenceResult<Vec<NpcPlacement>> {
        Ok(self
            .npc_placements
            .iter()
            .filter(|n| n.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn load_portals(&self, map_id: MapId) -> PersistenceResult<Vec<PortalDefinition>> {
        Ok(self
            .portals
            .iter()
            .filter(|p| p.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn load_bazaar(&self) -> PersistenceResult<Vec<BazaarListing>> {
        Ok(self.bazaar.values().cloned().collect())
    }

    async fn load_bazaar_by_id(&self, listing_id: i64) -> PersistenceResult<Option<BazaarListing>> {
        Ok(self.bazaar.get(&listing_id).cloned())
    }

    async fn load_families(&self) -> PersistenceResult<Vec<FamilyRecord>> {
        Ok(self.families.values().cloned().collect())
    }

    async fn load_family_by_id(
        &self,
        family_id: FamilyId,
    ) -> PersistenceResult<Option<FamilyRecord>> {
        Ok(self.families.get(&family_id).cloned())
    }

    async fn load_relations(&self) -> PersistenceResult<Vec<RelationRecord>> {
        Ok(self.relations.values().cloned().collect())
    }

    async fn load_relation_by_id(
        &self,
        relation_id: i64,
    ) -> PersistenceResult<Option<RelationRecord>> {
        Ok(self.relations.get(&relation_id).cloned())
    }

    async fn load_penalties(&self) -> PersistenceResult<Vec<PenaltyRecord>> {
        Ok(self.penalties.values().cloned().collect())
    }

    async fn load_penalty_by_id(
        &self,
        penalty_id: i64,
    ) -> PersistenceResult<Option<PenaltyRecord>> {
        Ok(self.penalties.get(&penalty_id).cloned())
    }

    async fn load_character(
        &self,
        character_id: CharacterId,
    ) -> PersistenceResult<Option<CharacterRecord>> {
        Ok(self.characters.lock().await.get(&character_id).cloned())
    }

    async fn save_character(&self, record: &CharacterRecord) -> PersistenceResult<()> {
        let mut characters = self.characters.lock().await;
        characters.insert(record.character_id, record.clone());
        let rows: Vec<CharacterRecord> = characters.values().cloned().collect();
        write_list(&self.data_dir, "characters.json", &rows).await
    }
}
