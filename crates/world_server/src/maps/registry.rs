//! Registry of live map instances.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use world_core::{MapId, MapInstanceId, MapInstanceKind, PersistenceGateway};

use crate::catalog::GameCatalog;
use crate::error::WorldError;
use crate::maps::bag::InstanceBag;
use crate::maps::instance::MapInstance;

/// Owns every live map instance, keyed by process-unique instance id, with a
/// side index from map definition to its single persistent instance.
pub struct MapInstanceRegistry {
    catalog: Arc<GameCatalog>,
    gateway: Arc<dyn PersistenceGateway>,
    instances: DashMap<MapInstanceId, Arc<MapInstance>>,
    persistent_by_map: DashMap<MapId, MapInstanceId>,
}

impl MapInstanceRegistry {
    pub fn new(catalog: Arc<GameCatalog>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            catalog,
            gateway,
            instances: DashMap::new(),
            persistent_by_map: DashMap::new(),
        }
    }

    /// Creates and registers a new instance of `map_id`.
    ///
    /// Fails with [`WorldError::MapDefinitionNotFound`] for unknown map ids.
    /// On success the instance's monsters, NPCs, and portals are loaded and
    /// active, and the instance is immediately resolvable by id.
    pub async fn create(
        &self,
        map_id: MapId,
        kind: MapInstanceKind,
        pvp: bool,
        bag: InstanceBag,
    ) -> Result<Arc<MapInstance>, WorldError> {
        let definition = self
            .catalog
            .map(map_id)
            .cloned()
            .ok_or(WorldError::MapDefinitionNotFound(map_id))?;

        let instance = Arc::new(MapInstance::new(definition, kind, pvp, bag));
        instance.load_content(&self.gateway).await?;

        self.instances.insert(instance.id(), instance.clone());
        if kind == MapInstanceKind::Persistent {
            self.persistent_by_map.insert(map_id, instance.id());
        }
        Ok(instance)
    }

    pub fn lookup(&self, id: MapInstanceId) -> Option<Arc<MapInstance>> {
        self.instances.get(&id).map(|entry| entry.value().clone())
    }

    /// The single long-lived instance of a map definition, if loaded.
    pub fn find_persistent_instance_of(&self, map_id: MapId) -> Option<Arc<MapInstance>> {
        let id = *self.persistent_by_map.get(&map_id)?;
        self.lookup(id)
    }

    /// Removes and disposes an instance.
    ///
    /// The instance is detached from the lookup table before disposal, so an
    /// in-flight broadcast sees either the live instance or "not found" and
    /// never a disposed one through the registry.
    pub fn remove(&self, id: MapInstanceId) -> bool {
        let Some((_, instance)) = self.instances.remove(&id) else {
            return false;
        };
        self.persistent_by_map
            .remove_if(&instance.map_id(), |_, mapped| *mapped == id);
        instance.dispose();
        info!("🗑️ Removed map instance {} (map {})", id, instance.map_id());
        true
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Snapshot of all live instances.
    pub fn all(&self) -> Vec<Arc<MapInstance>> {
        self.instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl std::fmt::Debug for MapInstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapInstanceRegistry")
            .field("instances", &self.instances.len())
            .field("persistent_maps", &self.persistent_by_map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_registry, test_session};
    use std::collections::HashSet;

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_map_definition_is_rejected() {
        let registry = test_registry(&[1]).await;
        let err = registry
            .create(MapId(99), MapInstanceKind::Generated, false, InstanceBag::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorldError::MapDefinitionNotFound(MapId(99))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_creates_yield_distinct_resolvable_ids() {
        let registry = Arc::new(test_registry(&[5]).await);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .create(
                        MapId(5),
                        MapInstanceKind::TimedChallenge,
                        false,
                        InstanceBag::new(3),
                    )
                    .await
                    .expect("create should succeed")
                    .id()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            let id = handle.await.expect("create task panicked");
            assert!(registry.lookup(id).is_some());
            ids.insert(id);
        }
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn removing_one_instance_leaves_siblings_intact() {
        let registry = test_registry(&[5]).await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let instance = registry
                .create(
                    MapId(5),
                    MapInstanceKind::TimedChallenge,
                    false,
                    InstanceBag::new(3),
                )
                .await
                .expect("create should succeed");
            ids.push(instance.id());
        }

        // Put an occupant on one of the survivors.
        let survivor = registry.lookup(ids[1]).expect("instance should exist");
        let (session, _rx) = test_session(7, "Ada");
        survivor.register_session(session);

        assert!(registry.remove(ids[0]));
        assert!(registry.lookup(ids[0]).is_none());
        assert!(registry.lookup(ids[1]).is_some());
        assert!(registry.lookup(ids[2]).is_some());
        assert_eq!(survivor.occupant_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn persistent_index_tracks_single_instance() {
        let registry = test_registry(&[1]).await;
        let instance = registry
            .create(MapId(1), MapInstanceKind::Persistent, false, InstanceBag::default())
            .await
            .expect("create should succeed");

        let found = registry
            .find_persistent_instance_of(MapId(1))
            .expect("persistent instance should be indexed");
        assert_eq!(found.id(), instance.id());

        registry.remove(instance.id());
        assert!(registry.find_persistent_instance_of(MapId(1)).is_none());
    }
}
