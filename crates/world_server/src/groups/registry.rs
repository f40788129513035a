//! Group and raid registries: id allocation and leave state machines.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::info;
use world_core::{CharacterId, GroupId, Localizer, Packet, RaidId};

use crate::groups::group::{Group, GroupState, GROUP_CAPACITY};
use crate::groups::raid::Raid;
use crate::session::Session;

/// Registry of live party groups.
///
/// Ids come from a strictly increasing counter starting at 1 and are never
/// reused, even after removal.
pub struct GroupRegistry {
    localizer: Arc<dyn Localizer>,
    groups: DashMap<GroupId, Arc<Group>>,
    next_id: AtomicI64,
}

impl GroupRegistry {
    pub fn new(localizer: Arc<dyn Localizer>) -> Self {
        Self {
            localizer,
            groups: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Allocates and registers a fresh, empty group.
    pub fn create(&self) -> Arc<Group> {
        let id = GroupId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let group = Arc::new(Group::new(id));
        self.groups.insert(id, group.clone());
        info!("👥 Created group {}", id);
        group
    }

    pub fn get(&self, id: GroupId) -> Option<Arc<Group>> {
        self.groups.get(&id).map(|g| g.clone())
    }

    /// Removes a group without any member notification. Leave flows use
    /// [`GroupRegistry::leave`] instead.
    pub fn remove(&self, id: GroupId) -> bool {
        self.groups.remove(&id).is_some()
    }

    /// The group a character currently belongs to, if any.
    pub fn find_group_of(&self, character_id: CharacterId) -> Option<Arc<Group>> {
        self.groups
            .iter()
            .find(|entry| entry.value().contains(character_id))
            .map(|entry| entry.value().clone())
    }

    pub fn is_group_full(&self, character_id: CharacterId) -> bool {
        self.find_group_of(character_id)
            .map(|g| g.is_full())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Adds a session to a group; first member becomes leader by position.
    pub fn join(&self, id: GroupId, session: Arc<Session>) -> bool {
        match self.get(id) {
            Some(group) => group.add_member(session),
            None => false,
        }
    }

    /// Removes a character from their group.
    ///
    /// A full group survives the departure: the member is removed, the next
    /// member by roster order is promoted if the leader left, and every
    /// remaining member receives the refreshed roster. A group below
    /// capacity cannot survive a departure: every original member (snapshot
    /// taken before any mutation) is told the group is closing, all members
    /// are removed, and the group is destroyed.
    pub async fn leave(&self, character_id: CharacterId) -> bool {
        let Some(group) = self.find_group_of(character_id) else {
            return false;
        };

        if group.len() >= GROUP_CAPACITY {
            let Some((removed, was_leader)) = group.remove_member(character_id) else {
                return false;
            };
            removed.send(Packet::GroupRoster {
                group_id: None,
                members: Vec::new(),
            });
            if was_leader {
                if let Some(new_leader) = group.leader() {
                    let notice = self
                        .localizer
                        .resolve("GROUP_NEW_LEADER", &[new_leader.character_name()]);
                    for member in group.members() {
                        member.send(Packet::Info {
                            text: notice.clone(),
                        });
                    }
                    info!(
                        "👑 Group {}: {} promoted to leader",
                        group.id(),
                        new_leader.character_name()
                    );
                }
            }
            group.broadcast_roster().await;
        } else {
            group.set_state(GroupState::Dissolving);
            let snapshot = group.members();
            let notice = self.localizer.resolve("GROUP_CLOSED", &[]);
            for member in &snapshot {
                member.send(Packet::Message {
                    text: notice.clone(),
                });
            }
            for member in &snapshot {
                group.remove_member(member.character_id());
                member.send(Packet::GroupRoster {
                    group_id: None,
                    members: Vec::new(),
                });
            }
            self.groups.remove(&group.id());
            info!("👥 Group {} dissolved", group.id());
        }
        true
    }

    /// Snapshot of all live groups, for the periodic roster pulse.
    pub fn all(&self) -> Vec<Arc<Group>> {
        self.groups.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// Registry of live raids, with its own id counter.
pub struct RaidRegistry {
    localizer: Arc<dyn Localizer>,
    raids: DashMap<RaidId, Arc<Raid>>,
    next_id: AtomicI64,
}

impl RaidRegistry {
    pub fn new(localizer: Arc<dyn Localizer>) -> Self {
        Self {
            localizer,
            raids: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn create(&self) -> Arc<Raid> {
        let id = RaidId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let raid = Arc::new(Raid::new(id));
        self.raids.insert(id, raid.clone());
        info!("⚔️ Created raid {}", id);
        raid
    }

    pub fn get(&self, id: RaidId) -> Option<Arc<Raid>> {
        self.raids.get(&id).map(|r| r.clone())
    }

    pub fn remove(&self, id: RaidId) -> bool {
        self.raids.remove(&id).is_some()
    }

    pub fn find_raid_of(&self, character_id: CharacterId) -> Option<Arc<Raid>> {
        self.raids
            .iter()
            .find(|entry| entry.value().contains(character_id))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.raids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raids.is_empty()
    }

    /// Removes a character from their raid.
    ///
    /// With more than one member remaining the raid survives; if the leaver
    /// led the raid, the first remaining member is promoted and announced.
    /// At one remaining member the raid dissolves.
    pub fn leave(&self, character_id: CharacterId) -> bool {
        let Some(raid) = self.find_raid_of(character_id) else {
            return false;
        };
        let Some((_, was_leader)) = raid.remove_member(character_id) else {
            return false;
        };

        if raid.len() > 1 {
            if was_leader {
                if let Some(new_leader) = raid.members().first().cloned() {
                    raid.set_leader(new_leader.character_id());
                    let notice = self
                        .localizer
                        .resolve("RAID_NEW_LEADER", &[new_leader.character_name()]);
                    raid.broadcast(Packet::Info { text: notice });
                    info!(
                        "👑 Raid {}: {} promoted to leader",
                        raid.id(),
                        new_leader.character_name()
                    );
                }
            }
        } else {
            let notice = self.localizer.resolve("RAID_CLOSED", &[]);
            raid.broadcast(Packet::Message { text: notice });
            for member in raid.members() {
                raid.remove_member(member.character_id());
            }
            self.raids.remove(&raid.id());
            info!("⚔️ Raid {} dissolved", raid.id());
        }
        true
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl std::fmt::Debug for RaidRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaidRegistry")
            .field("raids", &self.raids.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{drain, test_session};
    use world_core::KeyEcho;

    fn registry() -> GroupRegistry {
        GroupRegistry::new(Arc::new(KeyEcho))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ids_strictly_increase_from_one() {
        let registry = registry();
        let a = registry.create();
        let b = registry.create();
        registry.remove(a.id());
        let c = registry.create();
        assert_eq!(a.id(), GroupId(1));
        assert_eq!(b.id(), GroupId(2));
        assert_eq!(c.id(), GroupId(3));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn leader_departure_promotes_next_member() {
        let registry = registry();
        let group = registry.create();
        let (a, mut ra) = test_session(1, "Ada");
        let (b, mut rb) = test_session(2, "Grace");
        let (c, mut rc) = test_session(3, "Edsger");
        group.add_member(a);
        group.add_member(b);
        group.add_member(c);

        assert!(registry.leave(CharacterId(1)).await);
        assert_eq!(
            group.leader().map(|l| l.character_id()),
            Some(CharacterId(2))
        );

        // Remaining members get the promotion notice and a refreshed roster.
        let to_b = drain(&mut rb);
        assert!(to_b
            .iter()
            .any(|p| matches!(p, Packet::Info { text } if text.contains("GROUP_NEW_LEADER"))));
        let roster = to_b
            .iter()
            .find_map(|p| match p {
                Packet::GroupRoster {
                    group_id: Some(_),
                    members,
                } => Some(members.clone()),
                _ => None,
            })
            .expect("roster broadcast expected");
        assert_eq!(roster.len(), 2);
        assert!(roster[0].is_leader && roster[0].character_id == CharacterId(2));
        assert!(drain(&mut rc)
            .iter()
            .any(|p| matches!(p, Packet::GroupRoster { group_id: Some(_), .. })));

        // The leaver only gets the list-clearing packet.
        assert!(drain(&mut ra)
            .iter()
            .all(|p| matches!(p, Packet::GroupRoster { group_id: None, .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_leader_departure_keeps_leader() {
        let registry = registry();
        let group = registry.create();
        let (a, _ra) = test_session(1, "Ada");
        let (b, _rb) = test_session(2, "Grace");
        let (c, _rc) = test_session(3, "Edsger");
        group.add_member(a);
        group.add_member(b);
        group.add_member(c);

        assert!(registry.leave(CharacterId(2)).await);
        assert_eq!(
            group.leader().map(|l| l.character_id()),
            Some(CharacterId(1))
        );
        assert_eq!(group.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn two_member_group_dissolves_with_snapshot_notice() {
        let registry = registry();
        let group = registry.create();
        let (a, mut ra) = test_session(1, "Ada");
        let (b, mut rb) = test_session(2, "Grace");
        group.add_member(a);
        group.add_member(b);
        let id = group.id();

        assert!(registry.leave(CharacterId(1)).await);
        assert!(registry.get(id).is_none());

        // Both original members are told the group is closing.
        for rx in [&mut ra, &mut rb] {
            let packets = drain(rx);
            assert!(packets
                .iter()
                .any(|p| matches!(p, Packet::Message { text } if text.contains("GROUP_CLOSED"))));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn raid_thresholds() {
        let registry = RaidRegistry::new(Arc::new(KeyEcho));
        let raid = registry.create();
        let (a, _ra) = test_session(1, "Ada");
        let (b, _rb) = test_session(2, "Grace");
        let (c, _rc) = test_session(3, "Edsger");
        raid.add_member(a);
        raid.add_member(b);
        raid.add_member(c);

        // Leader leaves with two remaining: survive and promote.
        assert!(registry.leave(CharacterId(1)));
        assert!(registry.get(raid.id()).is_some());
        assert_eq!(raid.leader_id(), Some(CharacterId(2)));

        // Down to one remaining: dissolve.
        assert!(registry.leave(CharacterId(2)));
        assert!(registry.get(raid.id()).is_none());
    }
}
