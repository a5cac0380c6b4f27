use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::storage::{DistributedMutex, TokenRepo};

/// Start the periodic expired-token reaper.
///
/// Each tick spawns an independent sweep; ticks are never joined to each
/// other. Overlap safety comes entirely from the distributed mutex being
/// exclusive across the fleet, not from anything local.
pub fn start_reaper(
    store: Arc<dyn TokenRepo>,
    mutex: Arc<dyn DistributedMutex>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);

        loop {
            timer.tick().await;

            if store.ping().await.is_err() {
                debug!("storage unavailable, skipping reap tick");
                continue;
            }

            // Stale-tolerant fast path: if this process still holds the lock
            // from a previous tick, don't queue up behind itself.
            if mutex.is_locked() {
                debug!("reaper lock still held locally, skipping tick");
                continue;
            }

            let store = Arc::clone(&store);
            let mutex = Arc::clone(&mutex);
            tokio::spawn(async move {
                run_sweep(store.as_ref(), mutex.as_ref()).await;
            });
        }
    })
}

/// One sweep: take the fleet-wide lock, purge everything already expired,
/// release. Failures are terminal for this sweep only; the next tick retries
/// from scratch.
pub async fn run_sweep(store: &dyn TokenRepo, mutex: &dyn DistributedMutex) {
    if let Err(e) = mutex.lock().await {
        error!(error = %e, "failed to lock reaper mutex");
        return;
    }

    match store.delete_expired_before(Utc::now()).await {
        Ok(count) if count > 0 => info!(count, "reaped expired tokens"),
        Ok(_) => debug!("no expired tokens to reap"),
        Err(e) => error!(error = %e, "failed to reap expired tokens"),
    }

    if let Err(e) = mutex.unlock().await {
        error!(error = %e, "failed to unlock reaper mutex");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::TokenRecord;
    use crate::testutil::{MemoryMutex, MemoryTokenRepo};
    use chrono::Duration as ChronoDuration;

    fn record(signature: &str, expires_in: ChronoDuration) -> TokenRecord {
        TokenRecord {
            expired_at: Utc::now() + expires_in,
            meta: None,
            signature: signature.to_string(),
            subject: "42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired_records() {
        let store = MemoryTokenRepo::new();
        let mutex = MemoryMutex::new();

        store.insert(record("dead", ChronoDuration::hours(-1))).await;
        store.insert(record("live", ChronoDuration::hours(1))).await;

        run_sweep(&store, &mutex).await;

        assert!(store.get_token("dead").await.is_err());
        assert!(store.get_token("live").await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_releases_lock_after_storage_failure() {
        let store = MemoryTokenRepo::new();
        let mutex = MemoryMutex::new();

        store.insert(record("dead", ChronoDuration::hours(-1))).await;
        store.fail_deletes(true).await;

        run_sweep(&store, &mutex).await;

        // The lock must be free again even though the delete failed
        assert!(!mutex.is_locked());
        mutex.lock().await.unwrap();
        mutex.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_gives_up_when_lock_unavailable() {
        let store = MemoryTokenRepo::new();
        let mutex = MemoryMutex::new();

        store.insert(record("dead", ChronoDuration::hours(-1))).await;
        mutex.fail_acquire(true);

        run_sweep(&store, &mutex).await;

        // No deletion happened without the lock
        assert!(store.get_token("dead").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_serialize_on_the_mutex() {
        let store = Arc::new(MemoryTokenRepo::new());
        let mutex = Arc::new(MemoryMutex::new());

        for i in 0..10 {
            store
                .insert(record(&format!("dead-{i}"), ChronoDuration::hours(-1)))
                .await;
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let mutex = Arc::clone(&mutex);
            handles.push(tokio::spawn(async move {
                run_sweep(store.as_ref(), mutex.as_ref()).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 0);
        assert!(!mutex.is_locked());
    }
}
