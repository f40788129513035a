//! Shared test doubles: an in-memory persistence gateway and session
//! construction helpers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use world_core::{
    BazaarListing, CharacterId, CharacterRecord, DropDefinition, FamilyId, FamilyRecord,
    ItemDefinition, MailRecord, MapDefinition, MapId, MonsterPlacement, NpcDefinition,
    NpcPlacement, Packet, PenaltyRecord, PersistenceGateway, PersistenceResult, PortalDefinition,
    RecipeDefinition, RelationRecord, RespawnAnchor, ShopDefinition, ShopItemRecord,
    ShopSkillRecord, SkillDefinition, TeleporterRecord,
};

use crate::catalog::GameCatalog;
use crate::maps::MapInstanceRegistry;
use crate::session::Session;

/// In-memory [`PersistenceGateway`] with mutable row sets.
#[derive(Default)]
pub struct TestGateway {
    maps: Mutex<Vec<MapDefinition>>,
    items: Mutex<Vec<ItemDefinition>>,
    skills: Mutex<Vec<SkillDefinition>>,
    npc_definitions: Mutex<Vec<NpcDefinition>>,
    drops: Mutex<Vec<DropDefinition>>,
    recipes: Mutex<Vec<RecipeDefinition>>,
    shops: Mutex<Vec<ShopDefinition>>,
    shop_items: Mutex<Vec<ShopItemRecord>>,
    shop_skills: Mutex<Vec<ShopSkillRecord>>,
    teleporters: Mutex<Vec<TeleporterRecord>>,
    mail: Mutex<Vec<MailRecord>>,
    monster_placements: Mutex<Vec<MonsterPlacement>>,
    npc_placements: Mutex<Vec<NpcPlacement>>,
    portals: Mutex<Vec<PortalDefinition>>,
    bazaar: Mutex<HashMap<i64, BazaarListing>>,
    families: Mutex<HashMap<FamilyId, FamilyRecord>>,
    relations: Mutex<HashMap<i64, RelationRecord>>,
    penalties: Mutex<HashMap<i64, PenaltyRecord>>,
    characters: Mutex<HashMap<CharacterId, CharacterRecord>>,
    saved: Mutex<Vec<CharacterId>>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway pre-seeded with simple 100x100 map definitions.
    pub fn with_maps(map_ids: &[i16]) -> Self {
        let gateway = Self::new();
        for &map_id in map_ids {
            gateway.insert_map(MapDefinition {
                map_id: MapId(map_id),
                name: format!("map-{map_id}"),
                width: 100,
                height: 100,
                music: 0,
                shops_allowed: true,
            });
        }
        gateway
    }

    pub fn insert_map(&self, map: MapDefinition) {
        self.maps.lock().unwrap().push(map);
    }

    pub fn insert_bazaar(&self, row: BazaarListing) {
        self.bazaar.lock().unwrap().insert(row.listing_id, row);
    }

    pub fn remove_bazaar(&self, listing_id: i64) {
        self.bazaar.lock().unwrap().remove(&listing_id);
    }

    pub fn insert_family(&self, row: FamilyRecord) {
        self.families.lock().unwrap().insert(row.family_id, row);
    }

    pub fn insert_relation(&self, row: RelationRecord) {
        self.relations.lock().unwrap().insert(row.relation_id, row);
    }

    pub fn insert_penalty(&self, row: PenaltyRecord) {
        self.penalties.lock().unwrap().insert(row.penalty_id, row);
    }

    pub fn insert_character(&self, row: CharacterRecord) {
        self.characters.lock().unwrap().insert(row.character_id, row);
    }

    pub fn set_mail(&self, rows: Vec<MailRecord>) {
        *self.mail.lock().unwrap() = rows;
    }

    /// Character ids passed to `save_character`, in call order.
    pub fn saved_characters(&self) -> Vec<CharacterId> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceGateway for TestGateway {
    async fn load_maps(&self) -> PersistenceResult<Vec<MapDefinition>> {
        Ok(self.maps.lock().unwrap().clone())
    }

    async fn load_items(&self) -> PersistenceResult<Vec<ItemDefinition>> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn load_skills(&self) -> PersistenceResult<Vec<SkillDefinition>> {
        Ok(self.skills.lock().unwrap().clone())
    }

    async fn load_npc_definitions(&self) -> PersistenceResult<Vec<NpcDefinition>> {
        Ok(self.npc_definitions.lock().unwrap().clone())
    }

    async fn load_drops(&self) -> PersistenceResult<Vec<DropDefinition>> {
        Ok(self.drops.lock().unwrap().clone())
    }

    async fn load_recipes(&self) -> PersistenceResult<Vec<RecipeDefinition>> {
        Ok(self.recipes.lock().unwrap().clone())
    }

    async fn load_shops(&self) -> PersistenceResult<Vec<ShopDefinition>> {
        Ok(self.shops.lock().unwrap().clone())
    }

    async fn load_shop_items(&self) -> PersistenceResult<Vec<ShopItemRecord>> {
        Ok(self.shop_items.lock().unwrap().clone())
    }

    async fn load_shop_skills(&self) -> PersistenceResult<Vec<ShopSkillRecord>> {
        Ok(self.shop_skills.lock().unwrap().clone())
    }

    async fn load_teleporters(&self) -> PersistenceResult<Vec<TeleporterRecord>> {
        Ok(self.teleporters.lock().unwrap().clone())
    }

    async fn load_mail(&self) -> PersistenceResult<Vec<MailRecord>> {
        Ok(self.mail.lock().unwrap().clone())
    }

    async fn load_monster_placements(
        &self,
        map_id: MapId,
    ) -> PersistenceResult<Vec<MonsterPlacement>> {
        Ok(self
            .monster_placements
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn load_npc_placements(&self, map_id: MapId) -> PersistenceResult<Vec<NpcPlacement>> {
        Ok(self
            .npc_placements
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn load_portals(&self, map_id: MapId) -> PersistenceResult<Vec<PortalDefinition>> {
        Ok(self
            .portals
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.map_id == map_id)
            .cloned()
            .collect())
    }

    async fn load_bazaar(&self) -> PersistenceResult<Vec<BazaarListing>> {
        Ok(self.bazaar.lock().unwrap().values().cloned().collect())
    }

    async fn load_bazaar_by_id(&self, listing_id: i64) -> PersistenceResult<Option<BazaarListing>> {
        Ok(self.bazaar.lock().unwrap().get(&listing_id).cloned())
    }

    async fn load_families(&self) -> PersistenceResult<Vec<FamilyRecord>> {
        Ok(self.families.lock().unwrap().values().cloned().collect())
    }

    async fn load_family_by_id(
        &self,
        family_id: FamilyId,
    ) -> PersistenceResult<Option<FamilyRecord>> {
        Ok(self.families.lock().unwrap().get(&family_id).cloned())
    }

    async fn load_relations(&self) -> PersistenceResult<Vec<RelationRecord>> {
        Ok(self.relations.lock().unwrap().values().cloned().collect())
    }

    async fn load_relation_by_id(
        &self,
        relation_id: i64,
    ) -> PersistenceResult<Option<RelationRecord>> {
        Ok(self.relations.lock().unwrap().get(&relation_id).cloned())
    }

    async fn load_penalties(&self) -> PersistenceResult<Vec<PenaltyRecord>> {
        Ok(self.penalties.lock().unwrap().values().cloned().collect())
    }

    async fn load_penalty_by_id(
        &self,
        penalty_id: i64,
    ) -> PersistenceResult<Option<PenaltyRecord>> {
        Ok(self.penalties.lock().unwrap().get(&penalty_id).cloned())
    }

    async fn load_character(
        &self,
        character_id: CharacterId,
    ) -> PersistenceResult<Option<CharacterRecord>> {
        Ok(self.characters.lock().unwrap().get(&character_id).cloned())
    }

    async fn save_character(&self, record: &CharacterRecord) -> PersistenceResult<()> {
        self.characters
            .lock()
            .unwrap()
            .insert(record.character_id, record.clone());
        self.saved.lock().unwrap().push(record.character_id);
        Ok(())
    }
}

/// A character record with sensible test defaults.
pub fn test_record(id: i64, name: &str) -> CharacterRecord {
    CharacterRecord {
        character_id: CharacterId(id),
        account_name: format!("acct-{name}"),
        name: name.to_string(),
        level: 30,
        job_level: 10,
        hp: 500,
        mp: 300,
        gold: 1000,
        dignity: 100,
        reputation: 0,
        map_id: MapId(1),
        map_x: 10,
        map_y: 10,
        family_id: None,
        respawn: RespawnAnchor {
            map_id: MapId(1),
            x: 50,
            y: 50,
        },
    }
}

/// A registered-looking session plus the receiver for its outbound packets.
pub fn test_session(id: i64, name: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<Packet>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Session::new(test_record(id, name), tx)), rx)
}

/// Everything currently queued on a session's outbound channel.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Packet>) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Ok(packet) = rx.try_recv() {
        packets.push(packet);
    }
    packets
}

/// A map-instance registry over a seeded gateway and loaded catalog.
pub async fn test_registry(map_ids: &[i16]) -> MapInstanceRegistry {
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(TestGateway::with_maps(map_ids));
    let catalog = Arc::new(
        GameCatalog::load(&gateway)
            .await
            .expect("catalog load should succeed"),
    );
    MapInstanceRegistry::new(catalog, gateway)
}
