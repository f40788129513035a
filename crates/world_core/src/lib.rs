//! # World Core - Shared Vocabulary for the Meridian World Server
//!
//! This crate holds the types every other part of the server speaks in:
//!
//! * **Typed identifiers** - [`CharacterId`], [`MapInstanceId`], [`GroupId`]
//!   and friends, so the many numeric ids in this domain cannot be mixed up
//! * **Session-facing packets** - the typed [`Packet`] enum the orchestrator
//!   hands to the transport layer (wire encoding lives elsewhere)
//! * **Cross-node envelopes** - [`SyncNotice`] and [`CrossNodeEnvelope`] for
//!   the notification channel shared between cooperating server nodes
//! * **Collaborator contracts** - [`PersistenceGateway`] and [`Localizer`],
//!   the two external services the orchestrator depends on
//! * **Clock abstraction** - [`Clock`] with a deterministic [`ManualClock`]
//!   so countdown state machines are unit-testable without wall-clock sleeps
//! * **Shutdown coordination** - [`ShutdownState`] shared across components
//!
//! The crate deliberately contains no behavior beyond these contracts: all
//! orchestration logic lives in `world_server`.

pub mod clock;
pub mod events;
pub mod localization;
pub mod packet;
pub mod persistence;
pub mod records;
pub mod shutdown;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{
    CrossNodeEnvelope, MessageKind, Recipient, ResourceKind, SessionKickFilter, SyncNotice,
};
pub use localization::{KeyEcho, Localizer};
pub use packet::{BroadcastFilter, Packet, RosterEntry};
pub use persistence::{PersistenceError, PersistenceGateway, PersistenceResult};
pub use records::{
    BazaarListing, CharacterRecord, DropDefinition, FamilyMember, FamilyRank, FamilyRecord,
    ItemDefinition, MailRecord, MapDefinition, MonsterPlacement, NpcDefinition, NpcPlacement,
    PenaltyRecord, PortalDefinition, RecipeDefinition, RelationKind, RelationRecord,
    RespawnAnchor, ShopDefinition, ShopItemRecord, ShopSkillRecord, SkillDefinition,
    TeleporterRecord,
};
pub use shutdown::{ShutdownPhase, ShutdownState};
pub use types::{
    CharacterId, Coordinates, FamilyId, GroupId, MapId, MapInstanceId, MapInstanceKind, RaidId,
};
