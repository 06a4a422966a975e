//! JSON snapshot file reader.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::SnapshotReader;
use crate::core::Snapshot;
use crate::error::Result;

/// Reads a snapshot previously exported as JSON:
///
/// ```json
/// {"users": [...], "hotels": [...], "bookings": [...]}
/// ```
pub struct FileReader {
    path: PathBuf,
}

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotReader for FileReader {
    async fn read_snapshot(&self) -> Result<Snapshot> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        info!(
            "Read snapshot {:?}: {} users, {} hotels, {} bookings",
            self.path,
            snapshot.users.len(),
            snapshot.hotels.len(),
            snapshot.bookings.len()
        );
        Ok(snapshot)
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::metadata(&self.path).await?;
        Ok(())
    }

    fn source_type(&self) -> &str {
        "snapshot"
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_snapshot_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "users": [{{"id": 1, "name": "Alice", "email": "a@x.com"}}],
                "hotels": [{{"id": 1, "name": "Grand", "city": "Paris", "created_at": "2024-01-01 00:00:00"}}],
                "bookings": [{{"id": 1, "user_id": 1, "hotel_id": 1, "date": "2024-05-01"}}]
            }}"#
        )
        .unwrap();

        let reader = FileReader::new(file.path());
        reader.ping().await.unwrap();
        let snapshot = reader.read_snapshot().await.unwrap();
        assert_eq!(snapshot.users[0].name, "Alice");
        assert_eq!(
            snapshot.hotels[0].created_at.as_deref(),
            Some("2024-01-01 00:00:00")
        );
        assert_eq!(snapshot.bookings.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let reader = FileReader::new("/nonexistent/snapshot.json");
        assert!(matches!(
            reader.read_snapshot().await,
            Err(MigrateError::Io(_))
        ));
        assert!(reader.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_date_is_json_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bookings": [{{"id": 1, "user_id": 1, "hotel_id": 1, "date": "May 1st"}}]}}"#
        )
        .unwrap();

        let reader = FileReader::new(file.path());
        assert!(matches!(
            reader.read_snapshot().await,
            Err(MigrateError::Json(_))
        ));
    }
}
