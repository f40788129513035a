//! Party and raid groupings.

pub mod group;
pub mod raid;
pub mod registry;

pub use group::{Group, GroupState, GROUP_CAPACITY};
pub use raid::Raid;
pub use registry::{GroupRegistry, RaidRegistry};
