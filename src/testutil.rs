//! Shared test helpers — available to all `#[cfg(test)]` modules in the crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Semaphore};

use crate::config::{Config, DatabaseConfig, NodeConfig, TokenConfig};
use crate::maintenance::PartitionManager;
use crate::storage::lock::{DistributedMutex, LockError};
use crate::storage::models::TokenRecord;
use crate::storage::repository::{PartitionRepo, StorageError, TokenRepo, UserRepo};
use crate::tokens::HmacCodec;
use crate::AppState;

/// A codec with a valid 32-byte secret and the minimum entropy.
pub fn test_codec() -> HmacCodec {
    HmacCodec::new("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 32)
}

/// A minimal `Config` suitable for unit tests.
pub fn test_config() -> Config {
    Config {
        database: DatabaseConfig::default(),
        node: NodeConfig {
            bind_address: "127.0.0.1:8080".to_string(),
        },
        tokens: TokenConfig {
            secret: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            ..TokenConfig::default()
        },
    }
}

/// Build a full `Arc<AppState>` over in-memory fakes.
pub fn test_state() -> Arc<AppState> {
    let catalog = Arc::new(MemoryPartitionRepo::with_names(vec![
        "user_1_100000".to_string(),
    ]));
    Arc::new(AppState {
        codec: test_codec(),
        config: test_config(),
        partitions: Arc::new(PartitionManager::new(catalog, Arc::new(MemoryMutex::new()))),
        store: Arc::new(MemoryTokenRepo::new()),
        users: Arc::new(MemoryUserRepo::new()),
    })
}

/// In-memory [`UserRepo`] handing out sequential ids.
pub struct MemoryUserRepo {
    next_id: AtomicI64,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create_user(&self, _login: &str, _email: &str) -> Result<i64, StorageError> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// In-memory [`TokenRepo`] with switchable availability and delete failures.
pub struct MemoryTokenRepo {
    available: Mutex<bool>,
    delete_failure: Mutex<bool>,
    records: Mutex<HashMap<String, TokenRecord>>,
}

impl MemoryTokenRepo {
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            delete_failure: Mutex::new(false),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a record directly, bypassing the issuance path.
    pub async fn insert(&self, record: TokenRecord) {
        self.records
            .lock()
            .await
            .insert(record.signature.clone(), record);
    }

    pub async fn set_available(&self, available: bool) {
        *self.available.lock().await = available;
    }

    pub async fn fail_deletes(&self, fail: bool) {
        *self.delete_failure.lock().await = fail;
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    async fn check_available(&self) -> Result<(), StorageError> {
        if *self.available.lock().await {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }
}

#[async_trait]
impl TokenRepo for MemoryTokenRepo {
    async fn ping(&self) -> Result<(), StorageError> {
        self.check_available().await
    }

    async fn put_token(&self, record: &TokenRecord) -> Result<(), StorageError> {
        self.check_available().await?;
        self.insert(record.clone()).await;
        Ok(())
    }

    async fn get_token(&self, signature: &str) -> Result<TokenRecord, StorageError> {
        self.check_available().await?;
        self.records
            .lock()
            .await
            .get(signature)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_token(&self, signature: &str) -> Result<(), StorageError> {
        self.check_available().await?;
        if *self.delete_failure.lock().await {
            return Err(StorageError::Unavailable);
        }
        self.records.lock().await.remove(signature);
        Ok(())
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.check_available().await?;
        if *self.delete_failure.lock().await {
            return Err(StorageError::Unavailable);
        }
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.expired_at > cutoff);
        Ok((before - records.len()) as u64)
    }
}

/// In-memory [`PartitionRepo`] recording the partitions it was asked to create.
pub struct MemoryPartitionRepo {
    create_failure: Mutex<bool>,
    created: Mutex<Vec<(i64, i64)>>,
    names: Mutex<Vec<String>>,
}

impl MemoryPartitionRepo {
    pub fn with_names(names: Vec<String>) -> Self {
        Self {
            create_failure: Mutex::new(false),
            created: Mutex::new(Vec::new()),
            names: Mutex::new(names),
        }
    }

    pub async fn created(&self) -> Vec<(i64, i64)> {
        self.created.lock().await.clone()
    }

    pub async fn fail_creates(&self, fail: bool) {
        *self.create_failure.lock().await = fail;
    }
}

#[async_trait]
impl PartitionRepo for MemoryPartitionRepo {
    async fn partition_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.names.lock().await.clone())
    }

    async fn create_partition(&self, from_id: i64, to_id: i64) -> Result<(), StorageError> {
        if *self.create_failure.lock().await {
            return Err(StorageError::Unavailable);
        }
        self.created.lock().await.push((from_id, to_id));
        self.names
            .lock()
            .await
            .push(format!("user_{}_{}", from_id, to_id - 1));
        Ok(())
    }
}

/// In-process stand-in for the storage-backed mutex: a single-permit
/// semaphore with the same blocking-exclusive, non-reentrant contract.
pub struct MemoryMutex {
    acquire_failure: AtomicBool,
    held: AtomicBool,
    permits: Semaphore,
}

impl MemoryMutex {
    pub fn new() -> Self {
        Self {
            acquire_failure: AtomicBool::new(false),
            held: AtomicBool::new(false),
            permits: Semaphore::new(1),
        }
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.acquire_failure.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DistributedMutex for MemoryMutex {
    async fn lock(&self) -> Result<(), LockError> {
        if self.acquire_failure.load(Ordering::SeqCst) {
            return Err(LockError::Acquire("injected failure".to_string()));
        }
        self.permits
            .acquire()
            .await
            .map_err(|e| LockError::Acquire(e.to_string()))?
            .forget();
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unlock(&self) -> Result<(), LockError> {
        if !self.held.swap(false, Ordering::SeqCst) {
            return Err(LockError::Release("lock is not held".to_string()));
        }
        self.permits.add_permits(1);
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
