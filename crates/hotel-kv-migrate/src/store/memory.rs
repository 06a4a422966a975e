//! In-process key-value store.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyKind, KvStore};
use crate::error::{MigrateError, Result};
use crate::routing::SlotMap;

#[derive(Debug, Clone)]
enum Entry {
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    String(String),
}

impl Entry {
    fn kind(&self) -> KeyKind {
        match self {
            Entry::Hash(_) => KeyKind::Hash,
            Entry::List(_) => KeyKind::List,
            Entry::Set(_) => KeyKind::Set,
            Entry::String(_) => KeyKind::String,
        }
    }
}

fn wrong_type(key: &str, expected: KeyKind, found: &Entry) -> MigrateError {
    MigrateError::WrongType {
        key: key.to_string(),
        expected: expected.as_str(),
        found: found.kind().as_str(),
    }
}

/// Key-value store held in memory, with the same semantics as the cluster
/// commands it stands in for.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Entry>>,
    slot_map: Option<SlotMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a live slot table, as a cluster would.
    pub fn with_slot_map(mut self, map: SlotMap) -> Self {
        self.slot_map = Some(map);
        self
    }

    /// Remove every key.
    pub async fn clear(&self) {
        self.data.write().await.clear();
    }

    /// Number of keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// All keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut data = self.data.write().await;
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        match entry {
            Entry::Hash(hash) => {
                for (name, value) in fields {
                    hash.insert(name.clone(), value.clone());
                }
                Ok(())
            }
            other => Err(wrong_type(key, KeyKind::Hash, other)),
        }
    }

    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.data.read().await.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(hash)) => Ok(hash
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            Some(other) => Err(wrong_type(key, KeyKind::Hash, other)),
        }
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(list) => {
                list.push_front(value.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, KeyKind::List, other)),
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        match self.data.read().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(list)) => Ok(list.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, KeyKind::List, other)),
        }
    }

    async fn add_member(&self, key: &str, member: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        match entry {
            Entry::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, KeyKind::Set, other)),
        }
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        match self.data.read().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, KeyKind::Set, other)),
        }
    }

    async fn set_scalar(&self, key: &str, value: &str) -> Result<()> {
        // SET replaces whatever the key held.
        self.data
            .write()
            .await
            .insert(key.to_string(), Entry::String(value.to_string()));
        Ok(())
    }

    async fn get_scalar(&self, key: &str) -> Result<Option<String>> {
        match self.data.read().await.get(key) {
            None => Ok(None),
            Some(Entry::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(wrong_type(key, KeyKind::String, other)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn key_kind(&self, key: &str) -> Result<Option<KeyKind>> {
        Ok(self.data.read().await.get(key).map(Entry::kind))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn slot_map(&self) -> Result<Option<SlotMap>> {
        Ok(self.slot_map.clone())
    }

    fn store_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_upsert_merges_fields() {
        let store = MemoryStore::new();
        store
            .set_fields("user:1", &[("name".into(), "Alice".into())])
            .await
            .unwrap();
        store
            .set_fields(
                "user:1",
                &[
                    ("name".into(), "Alicia".into()),
                    ("email".into(), "a@x.com".into()),
                ],
            )
            .await
            .unwrap();

        let fields = store.get_fields("user:1").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["name"], "Alicia");
        assert_eq!(store.key_kind("user:1").await.unwrap(), Some(KeyKind::Hash));
    }

    #[tokio::test]
    async fn test_push_front_prepends() {
        let store = MemoryStore::new();
        for id in ["1", "2", "3"] {
            store.push_front("user:1:bookings", id).await.unwrap();
        }
        assert_eq!(
            store.list_range("user:1:bookings").await.unwrap(),
            vec!["3", "2", "1"]
        );
    }

    #[tokio::test]
    async fn test_sets_ignore_duplicates() {
        let store = MemoryStore::new();
        store.add_member("users:all", "2").await.unwrap();
        store.add_member("users:all", "1").await.unwrap();
        store.add_member("users:all", "2").await.unwrap();
        let mut members = store.members("users:all").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_missing_keys_read_empty() {
        let store = MemoryStore::new();
        assert!(store.get_fields("user:9").await.unwrap().is_empty());
        assert!(store.list_range("user:9:bookings").await.unwrap().is_empty());
        assert!(store.members("hotels:city:Nowhere").await.unwrap().is_empty());
        assert_eq!(store.get_scalar("user:email:none").await.unwrap(), None);
        assert_eq!(store.key_kind("user:9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = MemoryStore::new();
        store.set_scalar("user:email:a@x.com", "1").await.unwrap();

        let err = store
            .push_front("user:email:a@x.com", "1")
            .await
            .unwrap_err();
        match err {
            MigrateError::WrongType {
                expected, found, ..
            } => {
                assert_eq!(expected, "list");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = MemoryStore::new();
        store.push_front("user:1:bookings", "1").await.unwrap();
        store.set_scalar("k", "v").await.unwrap();
        store.delete("user:1:bookings").await.unwrap();
        assert_eq!(store.keys().await, vec!["k"]);

        store.clear().await;
        assert!(store.is_empty().await);
    }
}
