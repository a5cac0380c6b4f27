pub mod partitions;
pub mod reaper;

pub use partitions::PartitionManager;
pub use reaper::start_reaper;
