//! Configuration management for the Meridian world server.
//!
//! This module handles loading, validation, and conversion of node
//! configuration from TOML files. The world-server crate itself consumes a
//! flat string-keyed settings map, so this module is the only place that
//! knows about TOML.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use world_server::DailyEvent;

fn default_node_group() -> String {
    "meridian".to_string()
}
fn default_channel_id() -> u16 {
    1
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_rate() -> u32 {
    1
}
fn default_max_gold() -> i64 {
    1_000_000_000
}
fn default_max_level() -> u8 {
    99
}
fn default_max_job_level() -> u8 {
    80
}
fn default_max_sp_level() -> u8 {
    99
}
fn default_max_hero_level() -> u8 {
    50
}
fn default_heroic_start_level() -> u8 {
    88
}
fn default_arena_map_id() -> i16 {
    2006
}
fn default_family_arena_map_id() -> i16 {
    2106
}
fn default_refresh_timeout_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// World node settings
    pub server: ServerSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Scheduled daily events
    #[serde(default)]
    pub events: EventSettings,
}

/// Identity, rates, and caps for one world node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Node group shared by every node using the same durable store
    #[serde(default = "default_node_group")]
    pub node_group: String,
    /// Channel number shown to players
    #[serde(default = "default_channel_id")]
    pub channel_id: u16,
    /// Directory holding the seed data files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_rate")]
    pub rate_xp: u32,
    #[serde(default = "default_rate")]
    pub rate_heroic_xp: u32,
    #[serde(default = "default_rate")]
    pub rate_fairy_xp: u32,
    #[serde(default = "default_rate")]
    pub rate_drop: u32,
    #[serde(default = "default_rate")]
    pub rate_gold: u32,
    #[serde(default = "default_rate")]
    pub rate_gold_drop: u32,
    #[serde(default = "default_max_gold")]
    pub max_gold: i64,
    #[serde(default = "default_max_level")]
    pub max_level: u8,
    #[serde(default = "default_max_job_level")]
    pub max_job_level: u8,
    #[serde(default = "default_max_sp_level")]
    pub max_sp_level: u8,
    #[serde(default = "default_max_hero_level")]
    pub max_hero_level: u8,
    #[serde(default = "default_heroic_start_level")]
    pub heroic_start_level: u8,
    #[serde(default = "default_arena_map_id")]
    pub arena_map_id: i16,
    #[serde(default = "default_family_arena_map_id")]
    pub family_arena_map_id: i16,
    /// Upper bound on a cross-node refresh round trip, in seconds
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

/// Daily event schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSettings {
    /// One entry per daily event
    #[serde(default)]
    pub daily: Vec<DailyEventEntry>,
}

/// One configured daily event: a name and a `HH:MM` wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEventEntry {
    pub name: String,
    pub at: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                node_group: default_node_group(),
                channel_id: default_channel_id(),
                data_dir: default_data_dir(),
                rate_xp: default_rate(),
                rate_heroic_xp: default_rate(),
                rate_fairy_xp: default_rate(),
                rate_drop: default_rate(),
                rate_gold: default_rate(),
                rate_gold_drop: default_rate(),
                max_gold: default_max_gold(),
                max_level: default_max_level(),
                max_job_level: default_max_job_level(),
                max_sp_level: default_max_sp_level(),
                max_hero_level: default_max_hero_level(),
                heroic_start_level: default_heroic_start_level(),
                arena_map_id: default_arena_map_id(),
                family_arena_map_id: default_family_arena_map_id(),
                refresh_timeout_secs: default_refresh_timeout_secs(),
            },
            logging: LoggingSettings::default(),
            events: EventSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating a default file if none
    /// exists yet.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            let config = Self::default();
            let toml_content = toml::to_string_pretty(&config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration at {}", path.display());
            return Ok(config);
        }
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validates everything that would otherwise fail deep inside startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.node_group.is_empty() {
            return Err("server.node_group must not be empty".to_string());
        }
        if self.server.channel_id == 0 {
            return Err("server.channel_id must be at least 1".to_string());
        }
        if self.server.max_level == 0 {
            return Err("server.max_level must be at least 1".to_string());
        }
        if self.server.refresh_timeout_secs == 0 {
            return Err("server.refresh_timeout_secs must be at least 1".to_string());
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(format!("invalid log level '{other}'")),
        }
        for entry in &self.events.daily {
            parse_event_time(&entry.at)
                .map_err(|e| format!("event '{}': {e}", entry.name))?;
        }
        Ok(())
    }

    /// Flattens the server section into the string-keyed map the world
    /// crate's settings parser consumes.
    pub fn to_settings_map(&self) -> HashMap<String, String> {
        let s = &self.server;
        [
            ("node_group", s.node_group.clone()),
            ("channel_id", s.channel_id.to_string()),
            ("rate_xp", s.rate_xp.to_string()),
            ("rate_heroic_xp", s.rate_heroic_xp.to_string()),
            ("rate_fairy_xp", s.rate_fairy_xp.to_string()),
            ("rate_drop", s.rate_drop.to_string()),
            ("rate_gold", s.rate_gold.to_string()),
            ("rate_gold_drop", s.rate_gold_drop.to_string()),
            ("max_gold", s.max_gold.to_string()),
            ("max_level", s.max_level.to_string()),
            ("max_job_level", s.max_job_level.to_string()),
            ("max_sp_level", s.max_sp_level.to_string()),
            ("max_hero_level", s.max_hero_level.to_string()),
            ("heroic_start_level", s.heroic_start_level.to_string()),
            ("arena_map_id", s.arena_map_id.to_string()),
            ("family_arena_map_id", s.family_arena_map_id.to_string()),
            ("refresh_timeout_secs", s.refresh_timeout_secs.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Parses the configured daily schedule into typed events.
    pub fn daily_events(&self) -> Result<Vec<DailyEvent>, String> {
        self.events
            .daily
            .iter()
            .map(|entry| {
                let at = parse_event_time(&entry.at)
                    .map_err(|e| format!("event '{}': {e}", entry.name))?;
                Ok(DailyEvent {
                    name: entry.name.clone(),
                    at,
                })
            })
            .collect()
    }
}

fn parse_event_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|e| format!("invalid time '{raw}': {e}"))
}
