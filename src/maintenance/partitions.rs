use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::storage::{DistributedMutex, PartitionRepo};

/// Fixed id span covered by each user partition.
pub const PARTITION_WINDOW: i64 = 100_000;

/// Growth triggers once no more than this percentage of the current window
/// remains unconsumed.
const HEADROOM_PERCENT: i64 = 10;

/// Pre-provisions range partitions for the user table ahead of demand.
///
/// `last_id` caches the upper bound of the highest known partition. It starts
/// at 0 and is lazily seeded from the catalog; after that it only advances,
/// always by whole windows, and only while the distributed mutex is held.
pub struct PartitionManager {
    catalog: Arc<dyn PartitionRepo>,
    last_id: Mutex<i64>,
    mutex: Arc<dyn DistributedMutex>,
}

impl PartitionManager {
    pub fn new(catalog: Arc<dyn PartitionRepo>, mutex: Arc<dyn DistributedMutex>) -> Self {
        Self {
            catalog,
            last_id: Mutex::new(0),
            mutex,
        }
    }

    /// Fire-and-forget headroom check after a user row was created.
    ///
    /// Partition pre-provisioning is best-effort maintenance: every error is
    /// logged and swallowed, and the next user creation retries independently.
    pub fn spawn_growth_check(self: Arc<Self>, user_id: i64) {
        tokio::spawn(async move {
            self.ensure_headroom(user_id).await;
        });
    }

    /// Create the next partition if the current window is nearly consumed.
    ///
    /// Serialized across all instances by the distributed mutex, so two
    /// racing creators cannot both provision the same window.
    pub async fn ensure_headroom(&self, user_id: i64) {
        if let Err(e) = self.mutex.lock().await {
            error!(error = %e, "failed to lock partition-growth mutex");
            return;
        }

        if let Err(e) = self.grow_if_needed(user_id).await {
            error!(error = %e, user_id, "failed to grow user partitions");
        }

        if let Err(e) = self.mutex.unlock().await {
            error!(error = %e, "failed to unlock partition-growth mutex");
        }
    }

    async fn grow_if_needed(&self, user_id: i64) -> Result<(), crate::storage::StorageError> {
        let mut last_id = self.last_id.lock().await;

        if *last_id == 0 {
            *last_id = self.seed_from_catalog().await?;
        }

        if *last_id == 0 {
            // No partitions exist at all; the headroom formula would divide
            // by zero. Provision the first window outright.
            self.catalog.create_partition(1, PARTITION_WINDOW + 1).await?;
            *last_id = PARTITION_WINDOW;
            debug!(last_id = *last_id, "created initial user partition");
            return Ok(());
        }

        if (*last_id - user_id) * 100 / *last_id <= HEADROOM_PERCENT {
            let from_id = *last_id + 1;
            let to_id = *last_id + PARTITION_WINDOW + 1;
            self.catalog.create_partition(from_id, to_id).await?;
            *last_id += PARTITION_WINDOW;
            debug!(last_id = *last_id, "created user partition");
        }

        Ok(())
    }

    /// Highest partition upper bound found in the catalog; malformed names
    /// are skipped.
    async fn seed_from_catalog(&self) -> Result<i64, crate::storage::StorageError> {
        let names = self.catalog.partition_names().await?;

        let mut highest = 0;
        for name in names {
            let fields: Vec<&str> = name.split('_').collect();
            if fields.len() != 3 {
                continue;
            }
            match fields[2].parse::<i64>() {
                Ok(bound) if bound > highest => highest = bound,
                Ok(_) => {}
                Err(_) => debug!(name, "skipping partition with non-numeric bound"),
            }
        }

        debug!(last_id = highest, "seeded partition cursor from catalog");
        Ok(highest)
    }
}
