//! Configuration validation.

use super::{Config, SourceType, TargetType};
use crate::error::{MigrateError, Result};
use crate::routing::SLOT_COUNT;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    match config.source.r#type {
        SourceType::Mysql => {
            if config.source.host.is_empty() {
                return Err(MigrateError::Config("source.host is required".into()));
            }
            if config.source.database.is_empty() {
                return Err(MigrateError::Config("source.database is required".into()));
            }
            if config.source.user.is_empty() {
                return Err(MigrateError::Config("source.user is required".into()));
            }
        }
        SourceType::Snapshot => {
            if config.source.path.is_none() {
                return Err(MigrateError::Config(
                    "source.path is required when source.type is 'snapshot'".into(),
                ));
            }
        }
    }

    // Target validation
    if config.target.r#type == TargetType::RedisCluster {
        if config.target.nodes.is_empty() {
            return Err(MigrateError::Config(
                "target.nodes needs at least one startup node".into(),
            ));
        }
        if let Some(node) = config.target.nodes.iter().find(|n| n.trim().is_empty()) {
            return Err(MigrateError::Config(format!(
                "target.nodes contains an empty entry: '{}'",
                node
            )));
        }
    }

    // Routing validation
    let labels = &config.routing.node_labels;
    if labels.is_empty() {
        return Err(MigrateError::Config(
            "routing.node_labels needs at least one node".into(),
        ));
    }
    if labels.len() > SLOT_COUNT as usize {
        return Err(MigrateError::Config(format!(
            "routing.node_labels cannot exceed {} entries",
            SLOT_COUNT
        )));
    }

    // Migration config validation
    if config.migration.connect_attempts == 0 {
        return Err(MigrateError::Config(
            "migration.connect_attempts must be at least 1".into(),
        ));
    }

    Ok(())
}
