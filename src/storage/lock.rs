use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to acquire lock: {0}")]
    Acquire(String),
    #[error("failed to release lock: {0}")]
    Release(String),
}

/// Derive a stable numeric lock id from a task name.
///
/// Each logical maintenance task gets its own id, so distinct tasks never
/// contend for the same lock.
pub fn lock_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    i64::from_be_bytes(digest[..8].try_into().expect("SHA-256 digest is 32 bytes"))
}

/// Named exclusive lock whose ownership is enforced by the shared storage
/// engine, visible to every process instance using that storage.
///
/// Not reentrant: a second `lock()` without an intervening `unlock()` blocks
/// until the first holder releases, which for a single task is a
/// self-deadlock.
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Block until the lock is held. The storage layer's operation timeout
    /// bounds the wait when a holder has crashed without releasing.
    async fn lock(&self) -> Result<(), LockError>;

    async fn unlock(&self) -> Result<(), LockError>;

    /// Local, possibly stale view of this process's last acquisition.
    ///
    /// A cheap early-exit before attempting the real acquisition — never a
    /// substitute for it.
    fn is_locked(&self) -> bool;
}

/// Advisory-lock implementation on PostgreSQL.
///
/// Session-level `pg_advisory_lock`: the lock is tied to the connection that
/// took it, so that connection is checked out of the pool and held until
/// `unlock`.
pub struct PgMutex {
    conn: Mutex<Option<PoolConnection<Postgres>>>,
    held: AtomicBool,
    key: i64,
    pool: PgPool,
}

impl PgMutex {
    pub fn new(pool: PgPool, name: &str) -> Self {
        Self {
            conn: Mutex::new(None),
            held: AtomicBool::new(false),
            key: lock_key(name),
            pool,
        }
    }
}

#[async_trait]
impl DistributedMutex for PgMutex {
    async fn lock(&self) -> Result<(), LockError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| LockError::Acquire(e.to_string()))?;

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(self.key)
            .execute(&mut *conn)
            .await
            .map_err(|e| LockError::Acquire(e.to_string()))?;

        *self.conn.lock().await = Some(conn);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unlock(&self) -> Result<(), LockError> {
        let conn = self.conn.lock().await.take();
        let Some(mut conn) = conn else {
            return Err(LockError::Release("lock is not held".to_string()));
        };

        let result = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *conn)
            .await;

        // The connection returns to the pool either way; a dropped session
        // releases its advisory locks on the server.
        self.held.store(false, Ordering::SeqCst);
        result.map_err(|e| LockError::Release(e.to_string()))?;
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
