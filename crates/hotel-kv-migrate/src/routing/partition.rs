//! Hash slot computation and slot-to-node tables.

use crc::{Crc, CRC_16_XMODEM};
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Total number of hash slots in the cluster keyspace.
pub const SLOT_COUNT: u16 = 16384;

/// CRC-16 calculator (XMODEM / CCITT polynomial 0x1021)
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Compute the hash slot of a key.
///
/// If the key contains a non-empty `{...}` section, only that hash tag is
/// hashed, so keys sharing a tag land in the same slot.
pub fn key_slot(key: &str) -> u16 {
    CRC16.checksum(hash_tag(key.as_bytes())) % SLOT_COUNT
}

fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(len) = key[open + 1..].iter().position(|&b| b == b'}') {
            if len > 0 {
                return &key[open + 1..open + 1 + len];
            }
        }
    }
    key
}

/// Inclusive range of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn contains(&self, slot: u16) -> bool {
        self.start <= slot && slot <= self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }
}

/// Fixed partition of the slot space into contiguous ranges, one per node.
///
/// Mirrors how a cluster is laid out at creation time; it says nothing about
/// later resharding or failover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPartition {
    ranges: Vec<(SlotRange, String)>,
}

impl StaticPartition {
    /// Split `[0, SLOT_COUNT)` across `labels` in order.
    ///
    /// Range ends are rounded the same way cluster creation rounds them, so
    /// three nodes own 0-5460, 5461-10922 and 10923-16383.
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<Self> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(MigrateError::Config(
                "static partition needs at least one node".into(),
            ));
        }
        if labels.len() > SLOT_COUNT as usize {
            return Err(MigrateError::Config(format!(
                "static partition cannot have more than {} nodes",
                SLOT_COUNT
            )));
        }

        let max_slot = u32::from(SLOT_COUNT) - 1;
        let per_node = f64::from(SLOT_COUNT) / labels.len() as f64;
        let last_index = labels.len() - 1;
        let mut ranges = Vec::with_capacity(labels.len());
        let mut first: u32 = 0;
        let mut cursor = 0.0_f64;

        for (i, label) in labels.into_iter().enumerate() {
            let mut last = (cursor + per_node - 1.0).round() as u32;
            if last > max_slot || i == last_index {
                last = max_slot;
            }
            ranges.push((
                SlotRange {
                    start: first as u16,
                    end: last as u16,
                },
                label,
            ));
            first = last + 1;
            cursor += per_node;
        }

        Ok(Self { ranges })
    }

    /// Node owning a slot. Slots past the keyspace wrap around.
    pub fn node_for(&self, slot: u16) -> &str {
        let slot = slot % SLOT_COUNT;
        self.ranges
            .iter()
            .find(|(range, _)| range.contains(slot))
            .or_else(|| self.ranges.last())
            .map(|(_, label)| label.as_str())
            .unwrap_or_default()
    }

    /// All ranges with their owning node, in slot order.
    pub fn ranges(&self) -> &[(SlotRange, String)] {
        &self.ranges
    }
}

impl Default for StaticPartition {
    fn default() -> Self {
        Self {
            ranges: vec![
                (SlotRange { start: 0, end: 5460 }, "7001".to_string()),
                (SlotRange { start: 5461, end: 10922 }, "7002".to_string()),
                (SlotRange { start: 10923, end: 16383 }, "7003".to_string()),
            ],
        }
    }
}

/// One range of the live slot table reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRange {
    pub range: SlotRange,
    /// Primary address (`host:port`).
    pub primary: String,
    /// Replica addresses, in the order the cluster reports them.
    pub replicas: Vec<String>,
}

/// Live slot-to-node table as reported by the destination store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMap {
    ranges: Vec<LiveRange>,
}

impl SlotMap {
    pub fn new(mut ranges: Vec<LiveRange>) -> Self {
        ranges.sort_by_key(|r| r.range.start);
        Self { ranges }
    }

    pub fn lookup(&self, slot: u16) -> Option<&LiveRange> {
        self.ranges.iter().find(|r| r.range.contains(slot))
    }

    pub fn ranges(&self) -> &[LiveRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of slots the table assigns to some node.
    pub fn covered_slots(&self) -> usize {
        self.ranges.iter().map(|r| r.range.len()).sum()
    }
}
