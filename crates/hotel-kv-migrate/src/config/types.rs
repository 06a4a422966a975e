//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ConnectRetry;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Relational source configuration.
    #[serde(default)]
    pub source: SourceConfig,

    /// Key-value destination configuration.
    #[serde(default)]
    pub target: TargetConfig,

    /// Key placement reporting.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Kind of relational source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Live MySQL/MariaDB database.
    #[default]
    Mysql,
    /// JSON snapshot file.
    Snapshot,
}

/// Relational source configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source type (default: mysql).
    #[serde(default)]
    pub r#type: SourceType,

    /// Database host.
    #[serde(default = "default_localhost")]
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,

    /// Username.
    #[serde(default = "default_mysql_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Snapshot file (required when type is snapshot).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Read the created_at column of each table (default: true).
    #[serde(default = "default_true")]
    pub include_created_at: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            r#type: SourceType::default(),
            host: default_localhost(),
            port: default_mysql_port(),
            database: default_database(),
            user: default_mysql_user(),
            password: String::new(),
            path: None,
            include_created_at: true,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("path", &self.path)
            .field("include_created_at", &self.include_created_at)
            .finish()
    }
}

/// Kind of key-value destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Redis Cluster.
    #[default]
    RedisCluster,
    /// In-process store; contents are lost when the process exits.
    Memory,
}

/// Key-value destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target type (default: redis_cluster).
    #[serde(default)]
    pub r#type: TargetType,

    /// Cluster startup nodes.
    #[serde(default = "default_cluster_nodes")]
    pub nodes: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            r#type: TargetType::default(),
            nodes: default_cluster_nodes(),
        }
    }
}

/// Placement reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Owners of the static partition table, in slot order.
    #[serde(default = "default_node_labels")]
    pub node_labels: Vec<String>,

    /// Prefer the cluster's live slot table when it can be read (default: true).
    #[serde(default = "default_true")]
    pub live_topology: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            node_labels: default_node_labels(),
            live_topology: true,
        }
    }
}

/// What to do when a migration write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed write and return the error.
    #[default]
    FailFast,
    /// Keep going; count failed entities separately from migrated ones.
    BestEffort,
}

/// Order in which bookings are prepended to their user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipOrder {
    /// Ascending booking id, so each list reads highest id first.
    #[default]
    BookingId,
    /// Order rows were read from the source.
    Source,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Connection attempts per store (default: 10).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Delay between connection attempts in milliseconds (default: 2000).
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,

    /// Failure policy (default: fail_fast).
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Relationship list order (default: booking_id).
    #[serde(default)]
    pub relationship_order: RelationshipOrder,

    /// Delete each user's booking list before rebuilding it (default: true).
    #[serde(default = "default_true")]
    pub reset_relationship_lists: bool,

    /// Read back a sample after migrating (default: true).
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            connect_delay_ms: default_connect_delay_ms(),
            failure_policy: FailurePolicy::default(),
            relationship_order: RelationshipOrder::default(),
            reset_relationship_lists: true,
            verify: true,
        }
    }
}

impl MigrationConfig {
    /// Retry policy for connecting to either store.
    pub fn connect_retry(&self) -> ConnectRetry {
        ConnectRetry::new(
            self.connect_attempts,
            Duration::from_millis(self.connect_delay_ms),
        )
    }
}

// Default value functions for serde
fn default_localhost() -> String {
    "localhost".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_database() -> String {
    "hotel_db".to_string()
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_cluster_nodes() -> Vec<String> {
    (7001..=7003)
        .map(|port| format!("redis://127.0.0.1:{}", port))
        .collect()
}

fn default_node_labels() -> Vec<String> {
    vec!["7001".to_string(), "7002".to_string(), "7003".to_string()]
}

fn default_connect_attempts() -> u32 {
    10
}

fn default_connect_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
