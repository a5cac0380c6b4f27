pub mod db;
pub mod lock;
pub mod models;
pub mod repository;

pub use db::Database;
pub use lock::{DistributedMutex, LockError, PgMutex};
pub use repository::{PartitionRepo, StorageError, TokenRepo, UserRepo};
