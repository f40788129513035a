//! Error types and handling for the world server.
//!
//! This module defines the error types that can occur during orchestrator
//! operations, providing clear categorization of different failure modes.

use world_core::{CharacterId, MapId, MapInstanceId, ResourceKind};

/// Enumeration of possible world server errors.
///
/// Startup errors (configuration, empty catalogs) are fatal; the rest are
/// per-operation failures caught and logged at the operation boundary.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No map definition exists for the requested map id
    #[error("unknown map definition: {0}")]
    MapDefinitionNotFound(MapId),

    /// The referenced map instance is not (or no longer) registered
    #[error("map instance not found: {0}")]
    InstanceNotFound(MapInstanceId),

    /// No connected session owns the referenced character
    #[error("character not connected: {0}")]
    CharacterNotFound(CharacterId),

    /// A cross-node refresh round trip did not echo back in time
    #[error("refresh round trip timed out for {kind} id {id}")]
    RefreshTimeout { kind: ResourceKind, id: i64 },

    /// The durable store produced zero map definitions at boot
    #[error("no map definitions loaded")]
    NoMapDefinitions,

    /// A required setting is missing or unparsable
    #[error("configuration error for '{key}': {reason}")]
    Configuration { key: String, reason: String },

    /// The persistence gateway failed
    #[error("persistence error: {0}")]
    Persistence(#[from] world_core::PersistenceError),

    /// Internal errors that do not fit the categories above
    #[error("internal error: {0}")]
    Internal(String),
}
