//! Local mirrors of durable-store rows shared between nodes.
//!
//! Mutations only arrive through the sync bridge; reads come from request
//! handlers everywhere. Each list gets its own lock, held just for the apply
//! step, so a refresh on one list never blocks reads of another.

use std::collections::HashMap;
use tokio::sync::RwLock;
use world_core::{
    BazaarListing, CharacterId, FamilyId, FamilyRecord, PenaltyRecord, RelationRecord,
};

/// The four mirrored lists: bazaar listings, families, character relations,
/// and penalty logs.
#[derive(Debug, Default)]
pub struct CacheMirrors {
    bazaar: RwLock<HashMap<i64, BazaarListing>>,
    families: RwLock<HashMap<FamilyId, FamilyRecord>>,
    relations: RwLock<HashMap<i64, RelationRecord>>,
    penalties: RwLock<HashMap<i64, PenaltyRecord>>,
}

impl CacheMirrors {
    pub fn new() -> Self {
        Self::default()
    }

    // Boot-time fills, replacing the whole list.

    pub async fn fill_bazaar(&self, rows: Vec<BazaarListing>) {
        *self.bazaar.write().await = rows.into_iter().map(|r| (r.listing_id, r)).collect();
    }

    pub async fn fill_families(&self, rows: Vec<FamilyRecord>) {
        *self.families.write().await = rows.into_iter().map(|r| (r.family_id, r)).collect();
    }

    pub async fn fill_relations(&self, rows: Vec<RelationRecord>) {
        *self.relations.write().await = rows.into_iter().map(|r| (r.relation_id, r)).collect();
    }

    pub async fn fill_penalties(&self, rows: Vec<PenaltyRecord>) {
        *self.penalties.write().await = rows.into_iter().map(|r| (r.penalty_id, r)).collect();
    }

    // Refresh applications: present upserts, absent removes.

    pub async fn apply_bazaar(&self, listing_id: i64, row: Option<BazaarListing>) {
        let mut bazaar = self.bazaar.write().await;
        match row {
            Some(row) => {
                bazaar.insert(listing_id, row);
            }
            None => {
                bazaar.remove(&listing_id);
            }
        }
    }

    pub async fn apply_family(&self, family_id: FamilyId, row: Option<FamilyRecord>) {
        let mut families = self.families.write().await;
        match row {
            Some(row) => {
                families.insert(family_id, row);
            }
            None => {
                families.remove(&family_id);
            }
        }
    }

    pub async fn apply_relation(&self, relation_id: i64, row: Option<RelationRecord>) {
        let mut relations = self.relations.write().await;
        match row {
            Some(row) => {
                relations.insert(relation_id, row);
            }
            None => {
                relations.remove(&relation_id);
            }
        }
    }

    pub async fn apply_penalty(&self, penalty_id: i64, row: Option<PenaltyRecord>) {
        let mut penalties = self.penalties.write().await;
        match row {
            Some(row) => {
                penalties.insert(penalty_id, row);
            }
            None => {
                penalties.remove(&penalty_id);
            }
        }
    }

    // Read side.

    pub async fn bazaar_listing(&self, listing_id: i64) -> Option<BazaarListing> {
        self.bazaar.read().await.get(&listing_id).cloned()
    }

    pub async fn bazaar_count(&self) -> usize {
        self.bazaar.read().await.len()
    }

    pub async fn family(&self, family_id: FamilyId) -> Option<FamilyRecord> {
        self.families.read().await.get(&family_id).cloned()
    }

    pub async fn relations_of(&self, character_id: CharacterId) -> Vec<RelationRecord> {
        self.relations
            .read()
            .await
            .values()
            .filter(|r| r.character_id == character_id)
            .cloned()
            .collect()
    }

    pub async fn penalties_for_account(&self, account_name: &str) -> Vec<PenaltyRecord> {
        self.penalties
            .read()
            .await
            .values()
            .filter(|p| p.account_name == account_name)
            .cloned()
            .collect()
    }
}
