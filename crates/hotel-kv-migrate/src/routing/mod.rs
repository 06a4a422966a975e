//! Cluster-aware key placement.
//!
//! Every key maps to one of [`SLOT_COUNT`] hash slots via [`key_slot`]. A slot
//! is owned by a node, taken from the live slot table when the destination
//! store exposes one and from the [`StaticPartition`] otherwise. Placement is
//! reported for diagnostics only; it never decides where data is written.

mod partition;

pub use partition::{key_slot, LiveRange, SlotMap, SlotRange, StaticPartition, SLOT_COUNT};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RoutingConfig;
use crate::error::Result;
use crate::store::KvStore;

/// Where a placement's owner came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementOrigin {
    /// Live slot table queried from the cluster.
    Live,
    /// Fixed partition table.
    Static,
}

/// Physical placement of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub key: String,
    pub slot: u16,
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica: Option<String>,
    pub origin: PlacementOrigin,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> slot {} -> {}", self.key, self.slot, self.primary)?;
        if let Some(replica) = &self.replica {
            write!(f, " (replica {})", replica)?;
        }
        Ok(())
    }
}

/// Resolves keys to slots and slots to nodes.
#[derive(Debug, Clone, Default)]
pub struct Router {
    partition: StaticPartition,
    live: Option<SlotMap>,
}

impl Router {
    pub fn new(partition: StaticPartition) -> Self {
        Self {
            partition,
            live: None,
        }
    }

    /// Build the static table from configured node labels.
    pub fn from_config(config: &RoutingConfig) -> Result<Self> {
        Ok(Self::new(StaticPartition::new(config.node_labels.clone())?))
    }

    /// Use a live slot table ahead of the static one.
    pub fn with_slot_map(mut self, map: SlotMap) -> Self {
        self.live = (!map.is_empty()).then_some(map);
        self
    }

    /// Load the live slot table from the store.
    ///
    /// Returns whether a live table is now in use. Any failure keeps the
    /// static table.
    pub async fn refresh(&mut self, store: &dyn KvStore) -> bool {
        match store.slot_map().await {
            Ok(Some(map)) if !map.is_empty() => {
                info!(
                    "Using live slot table: {} ranges covering {} slots",
                    map.ranges().len(),
                    map.covered_slots()
                );
                self.live = Some(map);
                true
            }
            Ok(_) => {
                debug!("Store has no live slot table, using static partition");
                self.live = None;
                false
            }
            Err(e) => {
                debug!("Could not read live slot table ({}), using static partition", e);
                self.live = None;
                false
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Placement of a key, preferring the live table.
    pub fn placement(&self, key: &str) -> Placement {
        let slot = key_slot(key);
        match self.live.as_ref().and_then(|map| map.lookup(slot)) {
            Some(range) => Placement {
                key: key.to_string(),
                slot,
                primary: range.primary.clone(),
                replica: range.replicas.first().cloned(),
                origin: PlacementOrigin::Live,
            },
            None => self.static_placement_for_slot(key, slot),
        }
    }

    /// Placement of a key according to the static table only.
    pub fn static_placement(&self, key: &str) -> Placement {
        self.static_placement_for_slot(key, key_slot(key))
    }

    fn static_placement_for_slot(&self, key: &str, slot: u16) -> Placement {
        Placement {
            key: key.to_string(),
            slot,
            primary: self.partition.node_for(slot).to_string(),
            replica: None,
            origin: PlacementOrigin::Static,
        }
    }
}
