//! Destination key-value store.
//!
//! The migration and query layers only need a handful of primitives: hash
//! records, ordered lists, unordered sets and plain string values. The
//! [`KvStore`] trait exposes exactly those, so the same code runs against a
//! Redis cluster or the in-process [`MemoryStore`].

mod memory;
mod redis_cluster;

pub use memory::MemoryStore;
pub use redis_cluster::RedisClusterStore;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{TargetConfig, TargetType};
use crate::core::ConnectRetry;
use crate::error::Result;
use crate::routing::SlotMap;

/// Primitive held by a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Hash,
    List,
    Set,
    String,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Hash => "hash",
            KeyKind::List => "list",
            KeyKind::Set => "set",
            KeyKind::String => "string",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the migration and query layers need from the destination.
///
/// Reads of absent keys are not errors: they return an empty map, list or
/// set, or `None`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Upsert the given fields of a hash record.
    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// All fields of a hash record.
    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Prepend a value to a list.
    async fn push_front(&self, key: &str, value: &str) -> Result<()>;

    /// Full contents of a list, head first.
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;

    /// Add a member to a set.
    async fn add_member(&self, key: &str, member: &str) -> Result<()>;

    /// All members of a set, in no particular order.
    async fn members(&self, key: &str) -> Result<Vec<String>>;

    /// Set a plain string value.
    async fn set_scalar(&self, key: &str, value: &str) -> Result<()>;

    /// Get a plain string value.
    async fn get_scalar(&self, key: &str) -> Result<Option<String>>;

    /// Remove a key of any kind.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Primitive held by a key, `None` if the key does not exist.
    async fn key_kind(&self, key: &str) -> Result<Option<KeyKind>>;

    /// Round-trip check.
    async fn ping(&self) -> Result<()>;

    /// Live slot-to-node table, if the store is a cluster that reports one.
    async fn slot_map(&self) -> Result<Option<SlotMap>> {
        Ok(None)
    }

    /// Store type identifier (e.g. "redis_cluster", "memory").
    fn store_type(&self) -> &str;
}

/// Open the configured destination store.
pub async fn connect(config: &TargetConfig, retry: ConnectRetry) -> Result<Arc<dyn KvStore>> {
    match config.r#type {
        TargetType::RedisCluster => {
            let store = RedisClusterStore::connect(&config.nodes, retry).await?;
            Ok(Arc::new(store))
        }
        TargetType::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
