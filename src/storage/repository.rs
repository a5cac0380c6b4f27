use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::TokenRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage connection is not available")]
    Unavailable,
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => StorageError::Unavailable,
            e => StorageError::Database(e),
        }
    }
}

/// Persistence of token records, keyed by signature.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Cheap connectivity probe; maintenance tasks skip their tick when this fails.
    async fn ping(&self) -> Result<(), StorageError>;

    async fn put_token(&self, record: &TokenRecord) -> Result<(), StorageError>;

    /// Point lookup; `StorageError::NotFound` when absent.
    async fn get_token(&self, signature: &str) -> Result<TokenRecord, StorageError>;

    /// Unconditional delete. Deleting an absent record is a successful no-op;
    /// revocation is idempotent by design.
    async fn delete_token(&self, signature: &str) -> Result<(), StorageError>;

    /// Delete every record with `expired_at <= cutoff`, returning the count.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Catalog access for the range-partitioned user table.
#[async_trait]
pub trait PartitionRepo: Send + Sync {
    /// Names of existing user partitions (`user_<from>_<to>`) from the catalog.
    async fn partition_names(&self) -> Result<Vec<String>, StorageError>;

    /// Create the partition covering `[from_id, to_id)` and its `user_id` index.
    async fn create_partition(&self, from_id: i64, to_id: i64) -> Result<(), StorageError>;
}

/// User row creation; the id it returns drives partition growth checks.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, login: &str, email: &str) -> Result<i64, StorageError>;
}
