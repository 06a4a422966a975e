//! Migration orchestrator - main workflow coordinator.
//!
//! A run has three sequential phases: read the snapshot, apply the planned
//! writes one at a time, then read a sample back. Nothing runs concurrently,
//! so per-user relationship lists are always built in plan order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{Config, FailurePolicy, MigrationConfig};
use crate::core::Snapshot;
use crate::error::{MigrateError, Result};
use crate::mapper::{EntityKind, Mapper, MapperOptions, MigrationPlan, WriteOp};
use crate::query::QueryEngine;
use crate::routing::Router;
use crate::source::{self, SnapshotReader};
use crate::store::{self, KvStore};
use crate::verify::{self, VerifyReport};

/// Migration orchestrator.
pub struct Orchestrator {
    source: Arc<dyn SnapshotReader>,
    store: Arc<dyn KvStore>,
    router: Router,
    migration: MigrationConfig,
    config_hash: Option<String>,
}

/// Per-entity outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    /// Entities whose writes all succeeded.
    pub migrated: usize,

    /// Entities with at least one failed write.
    pub failed: usize,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA-256 of the configuration the run used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    /// Final status: "completed" or "completed_with_failures".
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    pub users: EntityStats,
    pub hotels: EntityStats,
    pub bookings: EntityStats,

    /// Individual store writes applied.
    pub writes_applied: usize,

    /// Individual store writes that failed (best-effort only).
    pub writes_failed: usize,

    /// Applied writes per owning node.
    pub node_distribution: BTreeMap<String, usize>,

    /// Whether placements came from the live slot table.
    pub live_topology: bool,

    /// Keys whose write failed (best-effort only).
    pub failed_keys: Vec<String>,

    /// Integrity hazards found in the source.
    pub warnings: Vec<String>,

    /// Read-back verification, if enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerifyReport>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn stats_mut(&mut self, kind: EntityKind) -> &mut EntityStats {
        match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Hotel => &mut self.hotels,
            EntityKind::Booking => &mut self.bookings,
        }
    }

    pub fn total_failed(&self) -> usize {
        self.users.failed + self.hotels.failed + self.bookings.failed
    }
}

/// Result of a health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_type: String,
    pub source_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_type: String,
    pub target_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub live_topology: bool,
}

impl HealthCheckResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Orchestrator {
    /// Connect to the configured source and destination.
    pub async fn new(config: Config) -> Result<Self> {
        let config_hash = config.hash();
        let retry = config.migration.connect_retry();
        let source = source::connect(&config.source, retry).await?;
        let store = store::connect(&config.target, retry).await?;

        let mut router = Router::from_config(&config.routing)?;
        if config.routing.live_topology {
            router.refresh(store.as_ref()).await;
        }

        Ok(Self::from_parts(source, store, router, config.migration)
            .with_config_hash(config_hash))
    }

    /// Assemble an orchestrator from already-open handles.
    pub fn from_parts(
        source: Arc<dyn SnapshotReader>,
        store: Arc<dyn KvStore>,
        router: Router,
        migration: MigrationConfig,
    ) -> Self {
        Self {
            source,
            store,
            router,
            migration,
            config_hash: None,
        }
    }

    /// Record the configuration hash on every run result.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.store)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Query layer over the destination store.
    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(self.store(), self.router.clone())
    }

    /// Read the source and migrate it.
    pub async fn run(&self) -> Result<MigrationResult> {
        info!("Phase 1: Reading snapshot from {}", self.source.source_type());
        let snapshot = self.source.read_snapshot().await?;
        self.migrate(&snapshot).await
    }

    /// Read the source and plan the writes without applying them.
    pub async fn plan_only(&self) -> Result<MigrationPlan> {
        let snapshot = self.source.read_snapshot().await?;
        Ok(self.plan(&snapshot))
    }

    pub fn plan(&self, snapshot: &Snapshot) -> MigrationPlan {
        Mapper::new(&self.router, MapperOptions::from(&self.migration)).plan(snapshot)
    }

    /// Apply the snapshot's writes to the destination store.
    ///
    /// Under `fail_fast` the first failed write aborts the run with
    /// [`MigrateError::Write`]; writes already applied stay in place. Under
    /// `best_effort` the failing entity's remaining writes are skipped, the
    /// entity is counted as failed and the run continues.
    pub async fn migrate(&self, snapshot: &Snapshot) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);
        if let Some(hash) = &self.config_hash {
            debug!("Config hash: {}", hash);
        }

        let plan = self.plan(snapshot);
        info!(
            "Phase 2: Applying {} writes ({} users, {} hotels, {} bookings)",
            plan.write_count(),
            plan.count(EntityKind::User),
            plan.count(EntityKind::Hotel),
            plan.count(EntityKind::Booking)
        );

        let mut result = MigrationResult {
            run_id,
            config_hash: self.config_hash.clone(),
            status: "completed".to_string(),
            duration_seconds: 0.0,
            started_at,
            completed_at: started_at,
            users: EntityStats::default(),
            hotels: EntityStats::default(),
            bookings: EntityStats::default(),
            writes_applied: 0,
            writes_failed: 0,
            node_distribution: BTreeMap::new(),
            live_topology: self.router.is_live(),
            failed_keys: Vec::new(),
            warnings: plan.warnings.clone(),
            verification: None,
        };

        for entity in &plan.entities {
            let mut entity_ok = true;

            for write in &entity.writes {
                debug!("{} {}", write.op.name(), write.placement);
                match apply(self.store.as_ref(), &write.op).await {
                    Ok(()) => {
                        result.writes_applied += 1;
                        *result
                            .node_distribution
                            .entry(write.placement.primary.clone())
                            .or_insert(0) += 1;
                    }
                    Err(e) => {
                        let key = write.op.key().to_string();
                        match self.migration.failure_policy {
                            FailurePolicy::FailFast => {
                                error!("Write to {} failed, aborting: {}", key, e);
                                return Err(MigrateError::write(key, e));
                            }
                            FailurePolicy::BestEffort => {
                                warn!(
                                    "Write to {} failed, skipping {} {}: {}",
                                    key, entity.kind, entity.id, e
                                );
                                result.writes_failed += 1;
                                result.failed_keys.push(key);
                                entity_ok = false;
                                break;
                            }
                        }
                    }
                }
            }

            let stats = result.stats_mut(entity.kind);
            if entity_ok {
                stats.migrated += 1;
            } else {
                stats.failed += 1;
            }
        }

        info!(
            "Migrated {} users, {} hotels, {} bookings",
            result.users.migrated, result.hotels.migrated, result.bookings.migrated
        );

        if result.total_failed() > 0 {
            result.status = "completed_with_failures".to_string();
            warn!(
                "{} entities failed: {:?}",
                result.total_failed(),
                result.failed_keys
            );
        }

        if self.migration.verify {
            info!("Phase 3: Verifying");
            result.verification = Some(verify::verify(self.store.as_ref(), snapshot).await);
        }

        let completed_at = Utc::now();
        result.completed_at = completed_at;
        result.duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        info!(
            "Migration {} in {:.2}s ({} writes)",
            result.status, result.duration_seconds, result.writes_applied
        );
        Ok(result)
    }

    /// Ping source and destination.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source_error = self.source.ping().await.err().map(|e| e.to_string());
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target_error = self.store.ping().await.err().map(|e| e.to_string());
        let target_latency_ms = start.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            healthy: source_error.is_none() && target_error.is_none(),
            source_type: self.source.source_type().to_string(),
            source_latency_ms,
            source_error,
            target_type: self.store.store_type().to_string(),
            target_latency_ms,
            target_error,
            live_topology: self.router.is_live(),
        })
    }

    /// Release source connections.
    pub async fn close(&self) {
        self.source.close().await;
    }
}

async fn apply(store: &dyn KvStore, op: &WriteOp) -> Result<()> {
    match op {
        WriteOp::SetFields { key, fields } => store.set_fields(key, fields).await,
        WriteOp::Delete { key } => store.delete(key).await,
        WriteOp::PushFront { key, value } => store.push_front(key, value).await,
        WriteOp::AddMember { key, member } => store.add_member(key, member).await,
        WriteOp::SetScalar { key, value } => store.set_scalar(key, value).await,
    }
}
