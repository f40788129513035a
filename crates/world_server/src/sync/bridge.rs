//! Cross-node change propagation.
//!
//! Cooperating nodes share one broadcast channel of [`SyncNotice`]s. The node
//! that changes a durable row publishes a notice; every subscriber (the
//! publisher included) reloads the row and reconciles its mirror. A local
//! caller that initiated the change can wait for its own node's round trip
//! to complete through a oneshot completion with a bounded timeout: a lost
//! echo fails with [`WorldError::RefreshTimeout`] instead of hanging.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use world_core::{FamilyId, PersistenceGateway, ResourceKind, SyncNotice};

use crate::error::WorldError;
use crate::sync::mirrors::CacheMirrors;

type WaiterKey = (ResourceKind, i64);

/// One node's endpoint on the shared notification channel.
pub struct SyncBridge {
    node_group: String,
    refresh_timeout: Duration,
    channel: broadcast::Sender<SyncNotice>,
    mirrors: Arc<CacheMirrors>,
    gateway: Arc<dyn PersistenceGateway>,
    waiters: DashMap<WaiterKey, Vec<oneshot::Sender<()>>>,
    receive_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SyncBridge {
    /// Creates a bridge on an existing channel. Nodes sharing a store pass
    /// clones of the same sender; the channel may carry several node groups
    /// at once (multi-tenant), so receivers filter on their own group.
    pub fn new(
        node_group: impl Into<String>,
        refresh_timeout: Duration,
        channel: broadcast::Sender<SyncNotice>,
        mirrors: Arc<CacheMirrors>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            node_group: node_group.into(),
            refresh_timeout,
            channel,
            mirrors,
            gateway,
            waiters: DashMap::new(),
            receive_loop: Mutex::new(None),
        }
    }

    /// A fresh channel for a standalone node (or the first node of a group).
    pub fn standalone_channel() -> broadcast::Sender<SyncNotice> {
        broadcast::channel(256).0
    }

    pub fn node_group(&self) -> &str {
        &self.node_group
    }

    /// Subscribes to the channel and spawns the receive loop. A bridge that
    /// is already listening stays as it is.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.receive_loop.lock().expect("receive loop slot poisoned");
        if slot.is_some() {
            warn!("⚠️ Sync bridge already listening; ignoring duplicate start");
            return;
        }
        let mut rx = self.channel.subscribe();
        let bridge = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!("🔄 Sync bridge listening for group '{}'", bridge.node_group);
            loop {
                match rx.recv().await {
                    Ok(notice) => bridge.handle_notice(notice).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("⚠️ Sync bridge lagged; {} notices missed", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("🔄 Sync channel closed; bridge stopping");
                        break;
                    }
                }
            }
        });
        *slot = Some(handle);
    }

    /// Stops the receive loop.
    pub fn stop(&self) {
        if let Some(handle) = self
            .receive_loop
            .lock()
            .expect("receive loop slot poisoned")
            .take()
        {
            handle.abort();
        }
    }

    /// Publishes a refresh notice and waits for this node's round trip.
    ///
    /// The wait resolves when the receive loop has reloaded the row and
    /// reconciled the mirror, whichever node originated the change. A round
    /// trip that never echoes fails after the configured timeout.
    pub async fn publish_and_wait(&self, kind: ResourceKind, id: i64) -> Result<(), WorldError> {
        let (tx, rx) = oneshot::channel();
        self.waiters.entry((kind, id)).or_default().push(tx);

        self.publish(kind, id)?;

        match tokio::time::timeout(self.refresh_timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            // Sender dropped without firing or timer elapsed: this caller's
            // echo is lost either way.
            Ok(Err(_)) | Err(_) => {
                self.discard_spent_waiters(kind, id);
                Err(WorldError::RefreshTimeout { kind, id })
            }
        }
    }

    /// Publishes a refresh notice without waiting.
    pub fn publish(&self, kind: ResourceKind, id: i64) -> Result<(), WorldError> {
        let notice = SyncNotice {
            kind,
            resource_id: id,
            origin_group: self.node_group.clone(),
        };
        self.channel
            .send(notice)
            .map_err(|_| WorldError::Internal("sync channel has no subscribers".to_string()))?;
        Ok(())
    }

    /// Applies one received notice: tenant filter, reload, reconcile, then
    /// complete any local waiters for that row.
    async fn handle_notice(&self, notice: SyncNotice) {
        if notice.origin_group != self.node_group {
            // Another tenant of the shared channel.
            return;
        }
        debug!(
            "🔄 Refreshing {} id {} (origin '{}')",
            notice.kind, notice.resource_id, notice.origin_group
        );
        if let Err(err) = self.apply(notice.kind, notice.resource_id).await {
            error!(
                "❌ Refresh of {} id {} failed: {}",
                notice.kind, notice.resource_id, err
            );
        }
        // Waiters complete even after a failed reload; the caller's contract
        // is "the round trip finished", not "the row exists".
        self.complete_waiters(notice.kind, notice.resource_id);
    }

    async fn apply(&self, kind: ResourceKind, id: i64) -> Result<(), WorldError> {
        match kind {
            ResourceKind::Bazaar => {
                let row = self.gateway.load_bazaar_by_id(id).await?;
                self.mirrors.apply_bazaar(id, row).await;
            }
            ResourceKind::Family => {
                let family_id = FamilyId(id);
                let row = self.gateway.load_family_by_id(family_id).await?;
                self.mirrors.apply_family(family_id, row).await;
            }
            ResourceKind::Relation => {
                let row = self.gateway.load_relation_by_id(id).await?;
                self.mirrors.apply_relation(id, row).await;
            }
            ResourceKind::PenaltyLog => {
                let row = self.gateway.load_penalty_by_id(id).await?;
                self.mirrors.apply_penalty(id, row).await;
            }
        }
        Ok(())
    }

    fn complete_waiters(&self, kind: ResourceKind, id: i64) {
        if let Some((_, waiters)) = self.waiters.remove(&(kind, id)) {
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
    }

    /// Prunes senders whose receiving half is gone. A caller that gave up
    /// only retires its own waiter; other callers' round trips for the same
    /// row keep their later deadlines.
    fn discard_spent_waiters(&self, kind: ResourceKind, id: i64) {
        if let Some(mut entry) = self.waiters.get_mut(&(kind, id)) {
            entry.retain(|tx| !tx.is_closed());
        }
        self.waiters.remove_if(&(kind, id), |_, senders| senders.is_empty());
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        if let Some(handle) = self
            .receive_loop
            .lock()
            .expect("receive loop slot poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBridge")
            .field("node_group", &self.node_group)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("pending_waiters", &self.waiters.len())
            .finish()
    }
}
