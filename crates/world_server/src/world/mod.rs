//! The orchestrator façade and its entry points.

pub mod bootstrap;
pub mod core;
pub mod messages;
pub mod transition;

pub use bootstrap::DailyEvent;
pub use core::WorldContext;
