//! One-time construction and startup of the world context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use world_core::{
    Clock, Localizer, MapInstanceKind, PersistenceGateway, ShutdownState, SyncNotice,
};

use crate::catalog::GameCatalog;
use crate::error::WorldError;
use crate::groups::{GroupRegistry, RaidRegistry};
use crate::maps::{InstanceBag, MapInstanceRegistry};
use crate::revive::ReviveWorkflow;
use crate::rng::RandomService;
use crate::scheduler::Scheduler;
use crate::session::SessionRegistry;
use crate::settings::WorldSettings;
use crate::sync::{CacheMirrors, SyncBridge};
use crate::world::core::WorldContext;

const SAVE_ALL_PERIOD: Duration = Duration::from_secs(5 * 60);
const GROUP_PULSE_PERIOD: Duration = Duration::from_secs(2);
const ANNOUNCEMENT_PERIOD: Duration = Duration::from_secs(3 * 60 * 60);
const MAIL_RELOAD_PERIOD: Duration = Duration::from_secs(30);
const ITEM_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// A configured time-of-day event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyEvent {
    pub name: String,
    pub at: chrono::NaiveTime,
}

impl WorldContext {
    /// Builds the whole orchestrator: parses settings, fills catalog caches
    /// and mirrors, creates the persistent-world and arena instances.
    ///
    /// Fatal errors (bad settings, zero map definitions, unreachable store)
    /// surface here, before the node starts serving.
    pub async fn bootstrap(
        settings_map: &HashMap<String, String>,
        gateway: Arc<dyn PersistenceGateway>,
        localizer: Arc<dyn Localizer>,
        clock: Arc<dyn Clock>,
        rng: Arc<RandomService>,
        sync_channel: broadcast::Sender<SyncNotice>,
        shutdown: ShutdownState,
    ) -> Result<Arc<Self>, WorldError> {
        let settings = WorldSettings::from_map(settings_map)?;
        info!(
            "🌍 Bootstrapping world node '{}' on channel {}",
            settings.node_group, settings.channel_id
        );

        let catalog = Arc::new(GameCatalog::load(&gateway).await?);

        let mirrors = Arc::new(CacheMirrors::new());
        let bazaar = gateway.load_bazaar().await?;
        info!("🛒 Mirrored {} bazaar listings", bazaar.len());
        mirrors.fill_bazaar(bazaar).await;
        let families = gateway.load_families().await?;
        info!("🏰 Mirrored {} families", families.len());
        mirrors.fill_families(families).await;
        let relations = gateway.load_relations().await?;
        info!("🤝 Mirrored {} relations", relations.len());
        mirrors.fill_relations(relations).await;
        let penalties = gateway.load_penalties().await?;
        info!("⚖️ Mirrored {} penalty logs", penalties.len());
        mirrors.fill_penalties(penalties).await;

        let bridge = Arc::new(SyncBridge::new(
            settings.node_group.clone(),
            settings.refresh_timeout,
            sync_channel,
            mirrors.clone(),
            gateway.clone(),
        ));

        let context = Arc::new(WorldContext {
            instances: MapInstanceRegistry::new(catalog.clone(), gateway.clone()),
            groups: GroupRegistry::new(localizer.clone()),
            raids: RaidRegistry::new(localizer.clone()),
            sessions: SessionRegistry::new(),
            revive: ReviveWorkflow::new(clock),
            scheduler: Scheduler::new(shutdown.clone()),
            settings,
            localizer,
            gateway,
            catalog,
            rng,
            mirrors,
            bridge,
            shutdown,
        });

        context.create_boot_instances().await?;
        Ok(context)
    }

    /// One persistent instance per map definition, plus the PvP arenas.
    async fn create_boot_instances(&self) -> Result<(), WorldError> {
        let mut map_ids: Vec<_> = self.catalog.maps().map(|m| m.map_id).collect();
        map_ids.sort();
        for map_id in map_ids {
            self.instances
                .create(map_id, MapInstanceKind::Persistent, false, InstanceBag::default())
                .await?;
        }
        info!(
            "🗺️ Created {} persistent map instances",
            self.instances.len()
        );

        for (label, map_id) in [
            ("arena", self.settings.arena_map_id),
            ("family arena", self.settings.family_arena_map_id),
        ] {
            if self.catalog.map(map_id).is_some() {
                self.instances
                    .create(map_id, MapInstanceKind::Arena, true, InstanceBag::default())
                    .await?;
                info!("🏟️ Created {} instance on map {}", label, map_id);
            } else {
                warn!("⚠️ No map definition {} for the {}; skipping", map_id, label);
            }
        }
        Ok(())
    }

    /// Starts the sync bridge and registers every maintenance task.
    pub fn start(self: &Arc<Self>, daily_events: &[DailyEvent]) {
        self.bridge.start();

        let context = Arc::clone(self);
        self.scheduler
            .register_periodic("save-all", SAVE_ALL_PERIOD, move || {
                let context = context.clone();
                async move { context.save_all().await }
            });

        let context = Arc::clone(self);
        self.scheduler
            .register_periodic("group-pulse", GROUP_PULSE_PERIOD, move || {
                let context = context.clone();
                async move { context.group_pulse().await }
            });

        let context = Arc::clone(self);
        self.scheduler
            .register_periodic("announcement", ANNOUNCEMENT_PERIOD, move || {
                let context = context.clone();
                async move { context.broadcast_announcement() }
            });

        let context = Arc::clone(self);
        self.scheduler
            .register_periodic("mail-reload", MAIL_RELOAD_PERIOD, move || {
                let context = context.clone();
                async move { context.reload_mail().await }
            });

        let context = Arc::clone(self);
        self.scheduler
            .register_periodic("item-sweep", ITEM_SWEEP_PERIOD, move || {
                let context = context.clone();
                async move { context.sweep_expired_items().await }
            });

        let context = Arc::clone(self);
        self.scheduler.register_once("environment-boot", move || {
            let context = context.clone();
            async move {
                let text = context.localizer.resolve("WORLD_ONLINE", &[]);
                context.shout(&text);
                Ok(())
            }
        });

        for event in daily_events {
            let context = Arc::clone(self);
            let event_name = event.name.clone();
            self.scheduler
                .register_daily(&format!("daily:{}", event.name), event.at, move || {
                    let context = context.clone();
                    let event_name = event_name.clone();
                    async move {
                        let text = context.localizer.resolve("EVENT_STARTED", &[&event_name]);
                        info!("🎉 Daily event '{}' starting", event_name);
                        context.shout(&text);
                        Ok(())
                    }
                });
        }

        info!(
            "🚀 World node '{}' started with {} scheduled tasks",
            self.settings.node_group,
            self.scheduler.specs().len()
        );
    }

    /// Graceful teardown: stop picking up work, flush characters, settle.
    pub async fn stop(&self) {
        self.shutdown.begin_draining();
        if let Err(err) = self.save_all().await {
            warn!("⚠️ Final save failed: {}", err);
        }
        self.bridge.stop();
        self.scheduler.abort_all();
        self.shutdown.mark_settled();
    }
}
