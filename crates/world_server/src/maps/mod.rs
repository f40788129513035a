//! Map instances and their registry.

pub mod bag;
pub mod instance;
pub mod registry;

pub use bag::InstanceBag;
pub use instance::MapInstance;
pub use registry::MapInstanceRegistry;
