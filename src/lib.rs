//! token-manager - HMAC-signed bearer token service over PostgreSQL
//!
//! This crate issues, validates, and revokes opaque bearer tokens with:
//! - An HMAC-SHA512/256 token codec whose signature doubles as the storage key
//! - Uniform introspection (no oracle distinguishing bad/unknown/expired)
//! - A periodic reaper purging expired records, serialized fleet-wide by a
//!   storage-backed distributed mutex
//! - Pre-provisioning of user-table range partitions, guarded by the same
//!   mutex primitive under a different lock id
//! - REST API

pub mod api;
pub mod config;
pub mod maintenance;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use config::Config;
use maintenance::PartitionManager;
use storage::{TokenRepo, UserRepo};
use tokens::HmacCodec;

/// Shared application state
pub struct AppState {
    pub codec: HmacCodec,
    pub config: Config,
    pub partitions: Arc<PartitionManager>,
    pub store: Arc<dyn TokenRepo>,
    pub users: Arc<dyn UserRepo>,
}
