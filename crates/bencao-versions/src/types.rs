//! Types and constants for snapshot versioning.

use crate::validator::PROBE_QUERY;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the active-pointer file inside the base directory.
pub const ACTIVE_VERSION_FILE: &str = "active_version.txt";

/// Prefix of snapshot directory names.
pub const DEFAULT_VERSION_PREFIX: &str = "chroma_v";

/// Zero-padded width of the numeric part of a version id.
pub const VERSION_NUMBER_WIDTH: usize = 3;

/// Maximum number of snapshots kept after a successful publish.
pub const DEFAULT_RETENTION_LIMIT: usize = 5;

/// Documents per engine call while building a snapshot.
pub const DEFAULT_BATCH_SIZE: usize = 50;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a version manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    /// Directory holding snapshots and the pointer file.
    pub base_dir: String,

    /// Snapshot directory name prefix.
    pub prefix: String,

    /// Snapshots kept after a successful publish.
    pub retention_limit: usize,

    /// Documents per engine call while building.
    pub batch_size: usize,

    /// Query issued by the smoke validator.
    pub probe_query: String,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            base_dir: "chroma_db".to_string(),
            prefix: DEFAULT_VERSION_PREFIX.to_string(),
            retention_limit: DEFAULT_RETENTION_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
            probe_query: PROBE_QUERY.to_string(),
        }
    }
}

// ============================================================================
// Version info
// ============================================================================

/// One snapshot as seen by readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version id, e.g. `chroma_v003`.
    pub id: String,

    /// Numeric part of the id.
    pub number: u32,

    /// Filesystem creation time (modification time where unavailable).
    pub created_at: DateTime<Local>,

    /// Whether the active pointer names this snapshot.
    pub is_active: bool,

    /// Snapshot directory.
    pub path: PathBuf,
}

impl VersionInfo {
    /// Creation time formatted for display.
    pub fn created_display(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_config_default() {
        let config = VersionsConfig::default();
        assert_eq!(config.base_dir, "chroma_db");
        assert_eq!(config.prefix, "chroma_v");
        assert_eq!(config.retention_limit, 5);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.probe_query, PROBE_QUERY);
    }

    #[test]
    fn test_versions_config_partial_json() {
        let config: VersionsConfig =
            serde_json::from_str(r#"{"base_dir": "/srv/index", "retention_limit": 3}"#).unwrap();
        assert_eq!(config.base_dir, "/srv/index");
        assert_eq!(config.retention_limit, 3);
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn test_version_info_serialization() {
        let info = VersionInfo {
            id: "chroma_v002".to_string(),
            number: 2,
            created_at: Local::now(),
            is_active: true,
            path: PathBuf::from("/srv/index/chroma_v002"),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"id\":\"chroma_v002\""));
        assert!(json.contains("\"is_active\":true"));
        assert_eq!(info.created_display().len(), "2026-01-01 00:00:00".len());
    }
}
