//! World settings parsed from the flat configuration map.
//!
//! The orchestrator is handed a flat string-keyed map of named settings,
//! read once at startup. Missing or unparsable required keys are fatal
//! startup errors; optional keys fall back to documented defaults.

use crate::error::WorldError;
use std::collections::HashMap;
use std::time::Duration;
use world_core::MapId;

/// Rates, caps, and identity settings for one world node.
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// Node group this process belongs to on the shared sync channel.
    pub node_group: String,
    /// Channel number shown to players and used to annotate cross-channel chat.
    pub channel_id: u16,

    // Progression/economy rates.
    pub xp_rate: u32,
    pub hero_xp_rate: u32,
    pub fairy_xp_rate: u32,
    pub drop_rate: u32,
    pub gold_rate: u32,
    pub gold_drop_rate: u32,
    pub max_gold: i64,

    // Level caps.
    pub max_level: u8,
    pub max_job_level: u8,
    pub max_sp_level: u8,
    pub max_hero_level: u8,
    pub heroic_start_level: u8,

    // Boot-time arena instances.
    pub arena_map_id: MapId,
    pub family_arena_map_id: MapId,

    /// Upper bound on a sync-bridge refresh round trip.
    pub refresh_timeout: Duration,
}

impl WorldSettings {
    /// Parses settings from the flat key/value map.
    ///
    /// Required keys: `node_group`, `channel_id`, `rate_xp`, `rate_drop`,
    /// `rate_gold`, `max_gold`, `max_level`. Everything else has a default.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, WorldError> {
        Ok(Self {
            node_group: required(map, "node_group")?,
            channel_id: required_parsed(map, "channel_id")?,
            xp_rate: required_parsed(map, "rate_xp")?,
            hero_xp_rate: optional_parsed(map, "rate_heroic_xp", 1)?,
            fairy_xp_rate: optional_parsed(map, "rate_fairy_xp", 1)?,
            drop_rate: required_parsed(map, "rate_drop")?,
            gold_rate: required_parsed(map, "rate_gold")?,
            gold_drop_rate: optional_parsed(map, "rate_gold_drop", 1)?,
            max_gold: required_parsed(map, "max_gold")?,
            max_level: required_parsed(map, "max_level")?,
            max_job_level: optional_parsed(map, "max_job_level", 80)?,
            max_sp_level: optional_parsed(map, "max_sp_level", 99)?,
            max_hero_level: optional_parsed(map, "max_hero_level", 50)?,
            heroic_start_level: optional_parsed(map, "heroic_start_level", 88)?,
            arena_map_id: MapId(optional_parsed(map, "arena_map_id", 2006)?),
            family_arena_map_id: MapId(optional_parsed(map, "family_arena_map_id", 2106)?),
            refresh_timeout: Duration::from_secs(optional_parsed(
                map,
                "refresh_timeout_secs",
                5u64,
            )?),
        })
    }
}

fn required(map: &HashMap<String, String>, key: &str) -> Result<String, WorldError> {
    map.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| WorldError::Configuration {
            key: key.to_string(),
            reason: "missing required setting".to_string(),
        })
}

fn required_parsed<T>(map: &HashMap<String, String>, key: &str) -> Result<T, WorldError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = required(map, key)?;
    raw.parse().map_err(|e| WorldError::Configuration {
        key: key.to_string(),
        reason: format!("unparsable value '{raw}': {e}"),
    })
}

fn optional_parsed<T>(
    map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, WorldError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match map.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| WorldError::Configuration {
            key: key.to_string(),
            reason: format!("unparsable value '{raw}': {e}"),
        }),
    }
}
