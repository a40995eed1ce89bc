pub mod engine;
pub mod memory;
pub mod persistence;

pub use engine::ResourceStore;
pub use memory::InMemoryStore;
pub use persistence::{SnapshotManager, TreeSnapshot};
