use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use super::models::TokenRecord;
use super::repository::{PartitionRepo, StorageError, TokenRepo, UserRepo};

/// First user partition is provisioned with the schema, so the partitioned
/// table is writable from the start.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS token (
    signature   TEXT PRIMARY KEY,
    subject     TEXT NOT NULL,
    meta        JSONB,
    expired_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS "user" (
    user_id     BIGINT GENERATED ALWAYS AS IDENTITY,
    login       TEXT NOT NULL,
    email       TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (user_id)
) PARTITION BY RANGE (user_id);
"#;

/// PostgreSQL-backed store.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database and apply the schema.
    ///
    /// The acquire timeout doubles as the upper bound on advisory-lock waits,
    /// since lock holders sit on pool connections.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        // Simple query protocol: SCHEMA_SQL is several statements
        self.pool.execute(SCHEMA_SQL).await?;
        // Bootstrap the first window explicitly so inserts never land on a
        // partitioned table with no partitions.
        self.create_partition(1, 100_001).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenRepo for Database {
    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn put_token(&self, record: &TokenRecord) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO token (signature, subject, meta, expired_at) VALUES ($1, $2, $3, $4)")
            .bind(&record.signature)
            .bind(&record.subject)
            .bind(&record.meta)
            .bind(record.expired_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_token(&self, signature: &str) -> Result<TokenRecord, StorageError> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT signature, subject, meta, expired_at FROM token WHERE signature = $1",
        )
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StorageError::NotFound)
    }

    async fn delete_token(&self, signature: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM token WHERE signature = $1")
            .bind(signature)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM token WHERE expired_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PartitionRepo for Database {
    async fn partition_names(&self) -> Result<Vec<String>, StorageError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_name LIKE 'user\\_%' AND table_schema = current_schema()",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn create_partition(&self, from_id: i64, to_id: i64) -> Result<(), StorageError> {
        let name = format!("user_{}_{}", from_id, to_id - 1);
        // DDL does not take bind parameters; both bounds are i64s we computed.
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" PARTITION OF \"user\" \
             FOR VALUES FROM ({from_id}) TO ({to_id})"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {name}_user_id ON \"{name}\" (user_id)"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for Database {
    async fn create_user(&self, login: &str, email: &str) -> Result<i64, StorageError> {
        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO \"user\" (login, email) VALUES ($1, $2) RETURNING user_id",
        )
        .bind(login)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_id)
    }
}
