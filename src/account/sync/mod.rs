pub mod classifier;
pub mod coordinator;
pub mod progress;

pub use coordinator::{OPTIMISTIC_INDEX_OFFSET, SyncConfig, SyncCoordinator};
pub use progress::CycleStats;
