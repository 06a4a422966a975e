//! # hotel-kv-migrate
//!
//! Migrates a relational Users/Hotels/Bookings dataset into a sharded
//! key-value store and queries it back without joins.
//!
//! - **Mapping** of rows, foreign keys and unique/non-unique columns onto
//!   hashes, lists, sets and plain strings
//! - **Slot routing** with CRC16 hash slots, a static partition table and the
//!   cluster's live slot table when available
//! - **Idempotent re-runs** by rebuilding relationship lists
//! - **Query layer** with multi-hop lookups that report every key's placement
//!
//! ## Example
//!
//! ```rust,no_run
//! use hotel_kv_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> hotel_kv_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Migrated {} bookings", result.bookings.migrated);
//!
//!     let history = orchestrator.query_engine().user_bookings(1).await?;
//!     for placement in &history.touched {
//!         println!("{}", placement);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod query;
pub mod routing;
pub mod source;
pub mod store;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, RoutingConfig, SourceConfig, TargetConfig};
pub use crate::core::{Booking, Hotel, Snapshot, User};
pub use error::{MigrateError, Result};
pub use mapper::{Mapper, MigrationPlan};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator};
pub use query::{QueryEngine, Traced};
pub use routing::{key_slot, Placement, Router, StaticPartition};
pub use store::{KvStore, MemoryStore};
