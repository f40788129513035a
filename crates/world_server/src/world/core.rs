//! The orchestrator façade.
//!
//! One `WorldContext` is built at process start and passed by reference into
//! every request handler, scheduled task, and sync-bridge callback. There is
//! no ambient global: whoever needs the world holds an `Arc` to it.

use std::sync::Arc;
use tracing::{debug, info, warn};
use world_core::{
    CharacterId, Coordinates, GroupId, ItemDefinition, Localizer, MapId, MapInstanceId,
    MapInstanceKind, NpcDefinition, Packet, PersistenceGateway, RaidId, ResourceKind,
    SessionKickFilter, ShutdownState, SkillDefinition,
};

use crate::catalog::GameCatalog;
use crate::error::WorldError;
use crate::groups::{Group, GroupRegistry, Raid, RaidRegistry};
use crate::maps::{InstanceBag, MapInstance, MapInstanceRegistry};
use crate::revive::{ReviveOutcome, ReviveWorkflow};
use crate::rng::RandomService;
use crate::scheduler::Scheduler;
use crate::session::{Session, SessionRegistry};
use crate::settings::WorldSettings;
use crate::sync::{CacheMirrors, SyncBridge};

/// Dignity cannot fall below this floor.
const DIGNITY_FLOOR: i32 = -1000;
/// Dignity penalties only apply above this level.
const DIGNITY_PENALTY_MIN_LEVEL: u8 = 20;
/// Radius of the random respawn offset around the anchor cell.
const RESPAWN_SCATTER: i32 = 3;
/// Visual played over a character coming back to life.
const REVIVE_EFFECT_ID: i32 = 6;

/// The world-state orchestrator for one server node.
pub struct WorldContext {
    pub(crate) settings: WorldSettings,
    pub(crate) localizer: Arc<dyn Localizer>,
    pub(crate) gateway: Arc<dyn PersistenceGateway>,
    pub(crate) catalog: Arc<GameCatalog>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) instances: MapInstanceRegistry,
    pub(crate) groups: GroupRegistry,
    pub(crate) raids: RaidRegistry,
    pub(crate) revive: ReviveWorkflow,
    pub(crate) rng: Arc<RandomService>,
    pub(crate) mirrors: Arc<CacheMirrors>,
    pub(crate) bridge: Arc<SyncBridge>,
    pub(crate) scheduler: Scheduler,
    pub(crate) shutdown: ShutdownState,
}

impl WorldContext {
    // --- session lifecycle ---------------------------------------------

    pub fn register_session(&self, session: Arc<Session>) {
        info!(
            "👤 Session registered for {} ({})",
            session.character_name(),
            session.character_id()
        );
        self.sessions.register(session);
    }

    /// Detaches a session from its instance and any grouping, then drops it
    /// from the registry.
    pub async fn unregister_session(&self, character_id: CharacterId) {
        if let Some(session) = self.sessions.get(character_id) {
            if let Some(instance_id) = session.current_instance() {
                if let Some(instance) = self.instances.lookup(instance_id) {
                    instance.unregister_session(character_id);
                    instance.broadcast(
                        Packet::EntityOut { character_id },
                        world_core::BroadcastFilter::AllExcept(character_id),
                    );
                }
            }
            self.groups.leave(character_id).await;
            self.raids.leave(character_id);
        }
        self.sessions.unregister(character_id);
    }

    pub fn session(&self, character_id: CharacterId) -> Option<Arc<Session>> {
        self.sessions.get(character_id)
    }

    pub fn session_by_name(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.find_by_name(name)
    }

    pub fn connected_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.connected()
    }

    // --- lookups --------------------------------------------------------

    pub fn find_instance(&self, id: MapInstanceId) -> Option<Arc<MapInstance>> {
        self.instances.lookup(id)
    }

    pub fn find_persistent_instance_of(&self, map_id: MapId) -> Option<Arc<MapInstance>> {
        self.instances.find_persistent_instance_of(map_id)
    }

    pub fn find_group_of(&self, character_id: CharacterId) -> Option<Arc<Group>> {
        self.groups.find_group_of(character_id)
    }

    pub fn find_raid_of(&self, character_id: CharacterId) -> Option<Arc<Raid>> {
        self.raids.find_raid_of(character_id)
    }

    pub fn is_group_full(&self, character_id: CharacterId) -> bool {
        self.groups.is_group_full(character_id)
    }

    pub fn item(&self, item_id: i64) -> Option<&ItemDefinition> {
        self.catalog.item(item_id)
    }

    pub fn skill(&self, skill_id: i64) -> Option<&SkillDefinition> {
        self.catalog.skill(skill_id)
    }

    pub fn npc_definition(&self, npc_id: i64) -> Option<&NpcDefinition> {
        self.catalog.npc_definition(npc_id)
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn mirrors(&self) -> &CacheMirrors {
        &self.mirrors
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // --- instance mutations ---------------------------------------------

    pub async fn create_instance(
        &self,
        map_id: MapId,
        kind: MapInstanceKind,
        pvp: bool,
        bag: InstanceBag,
    ) -> Result<Arc<MapInstance>, WorldError> {
        self.instances.create(map_id, kind, pvp, bag).await
    }

    pub fn remove_instance(&self, id: MapInstanceId) -> bool {
        self.instances.remove(id)
    }

    // --- group/raid mutations -------------------------------------------

    pub fn add_group(&self) -> Arc<Group> {
        self.groups.create()
    }

    pub fn remove_group(&self, id: GroupId) -> bool {
        self.groups.remove(id)
    }

    pub async fn group_leave(&self, character_id: CharacterId) -> bool {
        self.groups.leave(character_id).await
    }

    pub fn add_raid(&self) -> Arc<Raid> {
        self.raids.create()
    }

    pub fn remove_raid(&self, id: RaidId) -> bool {
        self.raids.remove(id)
    }

    pub fn raid_leave(&self, character_id: CharacterId) -> bool {
        self.raids.leave(character_id)
    }

    /// Rebroadcasts the roster of the character's group, if any.
    pub async fn update_group_roster(&self, character_id: CharacterId) {
        if let Some(group) = self.groups.find_group_of(character_id) {
            group.broadcast_roster().await;
        }
    }

    // --- revive ----------------------------------------------------------

    /// Starts the revive countdown for a freshly dead character.
    ///
    /// A second death while a countdown is pending is ignored: the guard
    /// flag stays claimed until the first countdown resolves.
    pub fn request_revive(self: &Arc<Self>, character_id: CharacterId) -> Result<(), WorldError> {
        let session = self
            .sessions
            .get(character_id)
            .ok_or(WorldError::CharacterNotFound(character_id))?;
        if !session.begin_revive() {
            debug!(
                "💀 Revive already pending for {}; ignoring",
                session.character_name()
            );
            return Ok(());
        }

        let context = Arc::clone(self);
        tokio::spawn(async move {
            let prompt = context.revive_prompt(&session).await;
            context.revive.prepare_death(&session, prompt).await;
            let outcome = context.revive.run_countdown(&session).await;
            if outcome == ReviveOutcome::Revived {
                if let Err(err) = context.apply_revive(&session).await {
                    warn!(
                        "⚠️ Auto-revive for {} failed: {}",
                        session.character_name(),
                        err
                    );
                }
            }
            session.end_revive();
        });
        Ok(())
    }

    async fn revive_prompt(&self, session: &Session) -> String {
        let kind = session
            .current_instance()
            .and_then(|id| self.instances.lookup(id))
            .map(|i| i.kind());
        let level = session.character().await.level;
        match kind {
            Some(MapInstanceKind::TimedChallenge) => {
                self.localizer.resolve("ASK_REVIVE_CHALLENGE", &[])
            }
            Some(MapInstanceKind::Arena) => self.localizer.resolve("ASK_REVIVE_ARENA", &[]),
            _ if level > DIGNITY_PENALTY_MIN_LEVEL => {
                self.localizer.resolve("ASK_REVIVE_WITH_PENALTY", &[])
            }
            _ => self.localizer.resolve("ASK_REVIVE", &[]),
        }
    }

    /// Applies the revive-at-anchor policy for the session's instance kind.
    pub(crate) async fn apply_revive(&self, session: &Arc<Session>) -> Result<(), WorldError> {
        let instance = session
            .current_instance()
            .and_then(|id| self.instances.lookup(id));
        let kind = instance
            .as_ref()
            .map(|i| i.kind())
            .unwrap_or(MapInstanceKind::Persistent);

        match kind {
            MapInstanceKind::Persistent => {
                let (anchor, level, character_id) = {
                    let mut character = session.character_mut().await;
                    character.hp = 1;
                    character.mp = 1;
                    if character.level > DIGNITY_PENALTY_MIN_LEVEL {
                        let penalty = i32::from(character.level.min(50));
                        character.dignity = (character.dignity - penalty).max(DIGNITY_FLOOR);
                    }
                    (character.respawn, character.level, character.id)
                };
                if level > DIGNITY_PENALTY_MIN_LEVEL {
                    if let Some(instance) = &instance {
                        let notice = self
                            .localizer
                            .resolve("DIGNITY_LOST", &[session.character_name()]);
                        instance.broadcast(
                            Packet::Say {
                                text: notice,
                                color: 11,
                            },
                            world_core::BroadcastFilter::Everyone,
                        );
                    }
                }

                let target = self
                    .find_persistent_instance_of(anchor.map_id)
                    .ok_or(WorldError::MapDefinitionNotFound(anchor.map_id))?;
                let position = self.scatter_around(&target, anchor.x, anchor.y);
                self.change_map_instance(character_id, target.id(), position)
                    .await?;
                target.broadcast(
                    Packet::Effect {
                        character_id,
                        effect_id: REVIVE_EFFECT_ID,
                    },
                    world_core::BroadcastFilter::Everyone,
                );
            }
            MapInstanceKind::TimedChallenge => {
                let instance = instance.ok_or_else(|| {
                    WorldError::Internal("challenge revive without instance".to_string())
                })?;
                let bag = instance.bag();
                if !bag.can_consume_life() {
                    // Terminal for this run: no life left to spend.
                    let mut character = session.character_mut().await;
                    character.hp = 0;
                    character.mp = 0;
                    let stats = character.stats_packet();
                    let condition = character.condition_packet();
                    drop(character);
                    session.send(stats);
                    session.send(condition);
                    session.send(Packet::Message {
                        text: self.localizer.resolve("CHALLENGE_OUT_OF_LIVES", &[]),
                    });
                    return Ok(());
                }
                bag.mark_dead(session.character_id());
                let mut character = session.character_mut().await;
                character.hp = 1;
                character.mp = 1;
                let stats = character.stats_packet();
                let condition = character.condition_packet();
                drop(character);
                session.send(stats);
                session.send(condition);
                instance.broadcast(
                    Packet::Revived {
                        character_id: session.character_id(),
                    },
                    world_core::BroadcastFilter::Everyone,
                );
                instance.broadcast(
                    Packet::Effect {
                        character_id: session.character_id(),
                        effect_id: REVIVE_EFFECT_ID,
                    },
                    world_core::BroadcastFilter::Everyone,
                );
            }
            MapInstanceKind::Arena | MapInstanceKind::Generated => {
                let mut character = session.character_mut().await;
                character.hp = character.hp_capacity();
                character.mp = character.mp_capacity();
                let stats = character.stats_packet();
                let condition = character.condition_packet();
                drop(character);
                session.send(stats);
                session.send(condition);
                if let Some(instance) = &instance {
                    instance.broadcast(
                        Packet::Revived {
                            character_id: session.character_id(),
                        },
                        world_core::BroadcastFilter::Everyone,
                    );
                    instance.broadcast(
                        Packet::Effect {
                            character_id: session.character_id(),
                            effect_id: REVIVE_EFFECT_ID,
                        },
                        world_core::BroadcastFilter::Everyone,
                    );
                }
            }
        }
        Ok(())
    }

    /// A position up to [`RESPAWN_SCATTER`] cells away from `(x, y)`,
    /// clamped to the instance's map bounds.
    fn scatter_around(&self, instance: &MapInstance, x: i16, y: i16) -> Coordinates {
        let definition = instance.definition();
        let dx = self.rng.range(-RESPAWN_SCATTER, RESPAWN_SCATTER + 1) as i16;
        let dy = self.rng.range(-RESPAWN_SCATTER, RESPAWN_SCATTER + 1) as i16;
        Coordinates::new(
            (x + dx).clamp(0, definition.width.saturating_sub(1)),
            (y + dy).clamp(0, definition.height.saturating_sub(1)),
        )
    }

    // --- misc façade operations ------------------------------------------

    /// Persists every connected character.
    pub async fn save_all(&self) -> Result<(), WorldError> {
        let sessions = self.sessions.connected();
        let total = sessions.len();
        let mut failures = 0usize;
        for session in sessions {
            let record = session.character().await.to_record();
            if let Err(err) = self.gateway.save_character(&record).await {
                failures += 1;
                warn!("⚠️ Failed to save character {}: {}", record.character_id, err);
            }
        }
        info!("💾 Saved {} characters ({} failures)", total - failures, failures);
        Ok(())
    }

    /// Sends a system-wide announcement to every connected session.
    pub fn shout(&self, text: &str) {
        for session in self.sessions.connected() {
            session.send(Packet::Say {
                text: text.to_string(),
                color: 10,
            });
            session.send(Packet::Info {
                text: text.to_string(),
            });
        }
    }

    /// Disconnects the named character, if connected here.
    pub fn kick(&self, character_name: &str) -> bool {
        match self.sessions.find_by_name(character_name) {
            Some(session) => {
                info!("🥾 Kicking {}", character_name);
                session.disconnect();
                true
            }
            None => false,
        }
    }

    /// Repositions a character on a uniformly random cell of their current
    /// instance.
    pub async fn teleport_to_random_cell(
        &self,
        character_id: CharacterId,
    ) -> Result<(), WorldError> {
        let session = self
            .sessions
            .get(character_id)
            .ok_or(WorldError::CharacterNotFound(character_id))?;
        let instance = session
            .current_instance()
            .and_then(|id| self.instances.lookup(id))
            .ok_or(WorldError::CharacterNotFound(character_id))?;

        let definition = instance.definition();
        let position = Coordinates::new(
            self.rng.range(0, i32::from(definition.width.max(1))) as i16,
            self.rng.range(0, i32::from(definition.height.max(1))) as i16,
        );
        session.character_mut().await.position = position;
        session.send(Packet::Teleport { position });
        session.send(Packet::MinimapPosition { position });
        Ok(())
    }

    /// Tells a session it is leaving its map (client-side teardown notice).
    pub fn leave_map(&self, character_id: CharacterId) {
        if let Some(session) = self.sessions.get(character_id) {
            session.send(Packet::MapOut);
        }
    }

    // --- sync-bridge entry points ----------------------------------------

    pub async fn on_bazaar_changed(&self, listing_id: i64) -> Result<(), WorldError> {
        self.bridge
            .publish_and_wait(ResourceKind::Bazaar, listing_id)
            .await
    }

    pub async fn on_family_changed(&self, family_id: i64) -> Result<(), WorldError> {
        self.bridge
            .publish_and_wait(ResourceKind::Family, family_id)
            .await
    }

    pub async fn on_relation_changed(&self, relation_id: i64) -> Result<(), WorldError> {
        self.bridge
            .publish_and_wait(ResourceKind::Relation, relation_id)
            .await
    }

    pub async fn on_penalty_log_changed(&self, penalty_id: i64) -> Result<(), WorldError> {
        self.bridge
            .publish_and_wait(ResourceKind::PenaltyLog, penalty_id)
            .await
    }

    /// Disconnects every session matched by the filter. An empty filter
    /// matches nothing.
    pub async fn on_session_kicked(&self, filter: &SessionKickFilter) {
        if filter.is_empty() {
            return;
        }
        for session in self.sessions.connected() {
            let by_id = filter.character_id == Some(session.character_id());
            let by_account = filter
                .account_name
                .as_deref()
                .is_some_and(|account| account == session.account_name());
            if by_id || by_account {
                info!(
                    "🥾 Session kick: disconnecting {} ({})",
                    session.character_name(),
                    session.character_id()
                );
                session.disconnect();
            }
        }
    }

    // --- scheduler task bodies -------------------------------------------

    /// Pushes the roster pulse to every group member.
    pub(crate) async fn group_pulse(&self) -> Result<(), WorldError> {
        for group in self.groups.all() {
            let entries = group.roster().await;
            for member in group.members() {
                member.send(Packet::GroupPulse {
                    entries: entries.clone(),
                });
            }
        }
        Ok(())
    }

    /// Reloads the mail cache and pings sessions holding unread mail.
    pub(crate) async fn reload_mail(&self) -> Result<(), WorldError> {
        let rows = self.gateway.load_mail().await?;
        self.catalog.replace_mail(rows).await;
        for session in self.sessions.connected() {
            let unread = self.catalog.unread_mail(session.character_id()).await;
            if unread > 0 {
                session.send_deferrable(Packet::MailNotice { unread });
            }
        }
        Ok(())
    }

    /// Drops time-expired transient items from every connected character.
    pub(crate) async fn sweep_expired_items(&self) -> Result<(), WorldError> {
        let now = chrono::Utc::now();
        for session in self.sessions.connected() {
            let expired = session.character_mut().await.expire_items(now);
            for item_id in expired {
                let name = self
                    .catalog
                    .item(item_id)
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| item_id.to_string());
                session.send_deferrable(Packet::Info {
                    text: self.localizer.resolve("ITEM_TIMEOUT", &[&name]),
                });
            }
        }
        Ok(())
    }

    /// Broadcasts one announcement from the rotating pool.
    pub(crate) fn broadcast_announcement(&self) -> Result<(), WorldError> {
        const POOL: [&str; 4] = [
            "ANNOUNCEMENT_RATES",
            "ANNOUNCEMENT_EVENTS",
            "ANNOUNCEMENT_RULES",
            "ANNOUNCEMENT_DISCORD",
        ];
        let key = POOL[self.rng.index(POOL.len())];
        let text = self.localizer.resolve(key, &[]);
        info!("📢 Broadcasting announcement '{}'", key);
        self.shout(&text);
        Ok(())
    }
}

impl std::fmt::Debug for WorldContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldContext")
            .field("node_group", &self.settings.node_group)
            .field("sessions", &self.sessions.len())
            .field("instances", &self.instances.len())
            .field("groups", &self.groups.len())
            .field("raids", &self.raids.len())
            .finish()
    }
}
