//! Cross-node synchronization: the bridge and the mirrored caches it keeps.

pub mod bridge;
pub mod mirrors;

pub use bridge::SyncBridge;
pub use mirrors::CacheMirrors;
