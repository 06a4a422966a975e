//! Relational snapshot readers.

mod file;
mod mysql;

pub use file::FileReader;
pub use mysql::MysqlReader;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceType};
use crate::core::{ConnectRetry, Snapshot};
use crate::error::{MigrateError, Result};

/// Trait for reading the relational source.
///
/// A reader produces one complete [`Snapshot`] of Users, Hotels and Bookings;
/// there are no partial or incremental reads.
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    /// Read every row of all three tables.
    async fn read_snapshot(&self) -> Result<Snapshot>;

    /// Round-trip check.
    async fn ping(&self) -> Result<()>;

    /// Get the source type identifier (e.g. "mysql", "snapshot").
    fn source_type(&self) -> &str;

    /// Release connections.
    async fn close(&self);
}

/// Open the configured source.
pub async fn connect(config: &SourceConfig, retry: ConnectRetry) -> Result<Arc<dyn SnapshotReader>> {
    match config.r#type {
        SourceType::Mysql => Ok(Arc::new(MysqlReader::connect(config, retry).await?)),
        SourceType::Snapshot => {
            let path = config.path.clone().ok_or_else(|| {
                MigrateError::Config("source.path is required for snapshot sources".into())
            })?;
            Ok(Arc::new(FileReader::new(path)))
        }
    }
}
