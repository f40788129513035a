//! # World Server - Concurrent World-State Orchestrator
//!
//! The authoritative core of one Meridian world node. This crate keeps the
//! live, in-memory state of many concurrently running map instances, the
//! sessions connected to them, and the transient social groupings on top,
//! while staying consistent with cooperating nodes that share the same
//! durable store.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **[`WorldContext`]** - The façade every entry point calls into. One is
//!   built at process start and passed by `Arc`; there is no global.
//! * **[`MapInstanceRegistry`]** - Owns every live map instance: the
//!   persistent world maps loaded at boot plus generated/challenge/arena
//!   instances created on demand.
//! * **[`GroupRegistry`] / [`RaidRegistry`]** - Party and raid lifecycles
//!   with leader promotion and dissolution broadcasts.
//! * **[`ReviveWorkflow`]** - The per-character thirty-tick revive countdown,
//!   driven by an injectable clock so tests advance time deterministically.
//! * **[`SyncBridge`]** - Cross-node change propagation over a shared
//!   broadcast channel, with bounded-wait refresh round trips.
//! * **[`Scheduler`]** - Save/pulse/announcement/mail/sweep maintenance
//!   tasks, each isolated so one failure never stops another.
//!
//! ### Entry Points
//!
//! Request handlers, scheduler tasks, and the sync-bridge receive loop all
//! funnel into the same `WorldContext` operations, so every mutation path
//! preserves the same invariants.

pub mod catalog;
pub mod error;
pub mod groups;
pub mod maps;
pub mod revive;
pub mod rng;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod sync;
pub mod world;

#[cfg(test)]
pub mod test_support;
#[cfg(test)]
mod tests;

pub use catalog::GameCatalog;
pub use error::WorldError;
pub use groups::{Group, GroupRegistry, Raid, RaidRegistry, GROUP_CAPACITY};
pub use maps::{InstanceBag, MapInstance, MapInstanceRegistry};
pub use revive::{ReviveOutcome, ReviveWorkflow, REVIVE_TICKS};
pub use rng::RandomService;
pub use scheduler::{Schedule, Scheduler, TaskSpec};
pub use session::{Character, CharacterField, Session, SessionRegistry};
pub use settings::WorldSettings;
pub use sync::{CacheMirrors, SyncBridge};
pub use world::{DailyEvent, WorldContext};
