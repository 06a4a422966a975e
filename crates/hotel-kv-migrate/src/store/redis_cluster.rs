//! Redis Cluster destination store.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, RedisResult, Value};
use tracing::{debug, info, warn};

use super::{KeyKind, KvStore};
use crate::core::ConnectRetry;
use crate::error::{MigrateError, Result};
use crate::routing::{LiveRange, SlotMap, SlotRange, SLOT_COUNT};

/// Redis Cluster store. Commands are routed to the owning node by the client.
pub struct RedisClusterStore {
    conn: ClusterConnection,
}

impl RedisClusterStore {
    /// Connect through the given startup nodes (`redis://host:port`).
    ///
    /// Connection and the first PING are retried per `retry`.
    pub async fn connect(nodes: &[String], retry: ConnectRetry) -> Result<Self> {
        if nodes.is_empty() {
            return Err(MigrateError::Config(
                "at least one Redis startup node is required".into(),
            ));
        }

        let client = ClusterClient::new(nodes.to_vec())?;
        let target = format!("Redis cluster [{}]", nodes.join(", "));

        let conn = retry
            .run(&target, || {
                let client = client.clone();
                async move {
                    let mut conn = client.get_async_connection().await?;
                    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                    Ok::<_, redis::RedisError>(conn)
                }
            })
            .await?;

        info!("Connected to {}", target);

        Ok(Self { conn })
    }

    fn conn(&self) -> ClusterConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl KvStore for RedisClusterStore {
    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let _: () = self.conn().hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.conn().hgetall(key).await?)
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<()> {
        let _: () = self.conn().lpush(key, value).await?;
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.conn().lrange(key, 0, -1).await?)
    }

    async fn add_member(&self, key: &str, member: &str) -> Result<()> {
        let _: () = self.conn().sadd(key, member).await?;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.conn().smembers(key).await?)
    }

    async fn set_scalar(&self, key: &str, value: &str) -> Result<()> {
        let _: () = self.conn().set(key, value).await?;
        Ok(())
    }

    async fn get_scalar(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn().get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _: () = self.conn().del(key).await?;
        Ok(())
    }

    async fn key_kind(&self, key: &str) -> Result<Option<KeyKind>> {
        let mut conn = self.conn();
        let kind: String = redis::cmd("TYPE").arg(key).query_async(&mut conn).await?;
        match kind.as_str() {
            "none" => Ok(None),
            "hash" => Ok(Some(KeyKind::Hash)),
            "list" => Ok(Some(KeyKind::List)),
            "set" => Ok(Some(KeyKind::Set)),
            "string" => Ok(Some(KeyKind::String)),
            other => Err(MigrateError::WrongType {
                key: key.to_string(),
                expected: "hash, list, set or string",
                found: other_kind(other),
            }),
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn slot_map(&self) -> Result<Option<SlotMap>> {
        let mut conn = self.conn();
        let raw: Vec<Value> = redis::cmd("CLUSTER")
            .arg("SLOTS")
            .query_async(&mut conn)
            .await?;

        let mut ranges = Vec::with_capacity(raw.len());
        for entry in &raw {
            match parse_slots_entry(entry) {
                Ok(Some(range)) => ranges.push(range),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable CLUSTER SLOTS entry: {}", e),
            }
        }
        debug!("CLUSTER SLOTS returned {} ranges", ranges.len());

        Ok(Some(SlotMap::new(ranges)))
    }

    fn store_type(&self) -> &str {
        "redis_cluster"
    }
}

fn other_kind(kind: &str) -> &'static str {
    match kind {
        "zset" => "zset",
        "stream" => "stream",
        _ => "unknown",
    }
}

/// Decode one `[start, end, [host, port, id], [host, port, id]...]` entry.
fn parse_slots_entry(entry: &Value) -> RedisResult<Option<LiveRange>> {
    let parts: Vec<Value> = redis::from_redis_value(entry)?;
    if parts.len() < 3 {
        return Ok(None);
    }

    let start: i64 = redis::from_redis_value(&parts[0])?;
    let end: i64 = redis::from_redis_value(&parts[1])?;

    let mut nodes = Vec::with_capacity(parts.len() - 2);
    for node in &parts[2..] {
        let fields: Vec<Value> = redis::from_redis_value(node)?;
        if fields.len() < 2 {
            continue;
        }
        let host: String = redis::from_redis_value(&fields[0])?;
        let port: i64 = redis::from_redis_value(&fields[1])?;
        nodes.push((host, port));
    }

    Ok(live_range(start, end, &nodes))
}

/// Build a live range from decoded slot bounds and `(host, port)` pairs; the
/// first node is the primary.
fn live_range(start: i64, end: i64, nodes: &[(String, i64)]) -> Option<LiveRange> {
    let max_slot = i64::from(SLOT_COUNT) - 1;
    if start < 0 || end > max_slot || start > end {
        return None;
    }

    let mut addrs = nodes.iter().map(|(host, port)| {
        if host.is_empty() {
            port.to_string()
        } else {
            format!("{}:{}", host, port)
        }
    });
    let primary = addrs.next()?;

    Some(LiveRange {
        range: SlotRange {
            start: start as u16,
            end: end as u16,
        },
        primary,
        replicas: addrs.collect(),
    })
}
