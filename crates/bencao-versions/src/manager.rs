//! Publish pipeline: build, validate, switch, prune.
//!
//! A candidate snapshot only becomes active after it has been built in
//! full and passed validation. Any failure before the pointer switch
//! deletes the candidate, so readers keep seeing the previously active
//! snapshot and the pointer never names a half-built directory.

use crate::builder::IndexBuilder;
use crate::store::VersionStore;
use crate::types::{VersionInfo, VersionsConfig, DEFAULT_BATCH_SIZE, DEFAULT_RETENTION_LIMIT};
use crate::validator::{SmokeValidator, SnapshotValidator};
use bencao_core::{expand_tilde, Error};
use bencao_vector::{Document, VectorEngine, VectorStore};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Content of the document published in place of an empty input.
pub const PLACEHOLDER_CONTENT: &str = "Placeholder content used to initialize an empty vector index.";

// ============================================================================
// Errors
// ============================================================================

/// Stage of the publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    /// No publish in progress.
    Idle,
    /// Writing the candidate snapshot.
    Building,
    /// Probing the candidate.
    Validating,
    /// Switching the active pointer.
    Publishing,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Validating => "validating",
            Self::Publishing => "publishing",
        };
        f.write_str(name)
    }
}

/// Why a publish or activation did not take effect.
///
/// In every case the previously active snapshot is still active.
#[derive(ThisError, Debug)]
pub enum PublishError {
    /// The candidate could not be built.
    #[error("failed to build {version}: {source}")]
    Build {
        /// Candidate id.
        version: String,
        /// Underlying engine or filesystem error.
        #[source]
        source: Error,
    },

    /// The candidate did not pass validation.
    #[error("{version} failed validation")]
    Validation {
        /// Candidate id.
        version: String,
    },

    /// The active pointer could not be switched.
    #[error("failed to activate {version}: {source}")]
    Commit {
        /// Candidate id.
        version: String,
        /// Underlying error.
        #[source]
        source: Error,
    },

    /// The version store could not name a candidate.
    #[error("version store error: {0}")]
    Store(#[from] Error),
}

impl PublishError {
    /// The stage the pipeline was in when it failed.
    pub fn stage(&self) -> PublishStage {
        match self {
            Self::Build { .. } | Self::Store(_) => PublishStage::Building,
            Self::Validation { .. } => PublishStage::Validating,
            Self::Commit { .. } => PublishStage::Publishing,
        }
    }

    /// The candidate id, when one had been chosen.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Build { version, .. }
            | Self::Validation { version }
            | Self::Commit { version, .. } => Some(version.as_str()),
            Self::Store(_) => None,
        }
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Publishes snapshots under one base directory.
///
/// Not internally synchronized: callers must not run two publishes against
/// the same base directory at once.
pub struct VersionManager {
    store: VersionStore,
    engine: Arc<dyn VectorEngine>,
    validator: Box<dyn SnapshotValidator>,
    batch_size: usize,
    retention_limit: usize,
}

impl VersionManager {
    /// Create a manager with default settings and a [`SmokeValidator`].
    pub fn new(base_dir: impl Into<PathBuf>, engine: Arc<dyn VectorEngine>) -> Self {
        Self {
            store: VersionStore::new(base_dir),
            validator: Box::new(SmokeValidator::new(engine.clone())),
            engine,
            batch_size: DEFAULT_BATCH_SIZE,
            retention_limit: DEFAULT_RETENTION_LIMIT,
        }
    }

    /// Create a manager from configuration. `~` in `base_dir` is expanded.
    pub fn from_config(config: &VersionsConfig, engine: Arc<dyn VectorEngine>) -> Self {
        let validator =
            SmokeValidator::new(engine.clone()).with_probe(config.probe_query.clone());
        Self::new(expand_tilde(&config.base_dir), engine)
            .with_prefix(config.prefix.clone())
            .with_batch_size(config.batch_size)
            .with_retention_limit(config.retention_limit)
            .with_validator(validator)
    }

    /// Replace the validator.
    pub fn with_validator(mut self, validator: impl SnapshotValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Documents per engine call while building. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Snapshots kept after a successful publish. Zero is treated as one.
    pub fn with_retention_limit(mut self, limit: usize) -> Self {
        self.retention_limit = limit.max(1);
        self
    }

    /// Use a different snapshot name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.store = self.store.with_prefix(prefix);
        self
    }

    /// The underlying version store.
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Snapshots kept after a successful publish.
    pub fn retention_limit(&self) -> usize {
        self.retention_limit
    }

    /// Documents per engine call while building.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// See [`VersionStore::current_version`].
    pub fn current_version(&self) -> bencao_core::Result<Option<String>> {
        self.store.current_version()
    }

    /// See [`VersionStore::list_versions`].
    pub fn list_versions(&self) -> bencao_core::Result<Vec<VersionInfo>> {
        self.store.list_versions()
    }

    /// See [`VersionStore::active_path`].
    pub fn active_path(&self) -> bencao_core::Result<Option<PathBuf>> {
        self.store.active_path()
    }

    /// Open the active snapshot for querying, if one is active.
    pub async fn open_active(&self) -> bencao_core::Result<Option<Box<dyn VectorStore>>> {
        match self.store.active_path()? {
            Some(path) => Ok(Some(self.engine.load(&path).await?)),
            None => Ok(None),
        }
    }

    /// Build, validate and activate a new snapshot, then prune old ones.
    ///
    /// Empty input publishes a single placeholder document. Returns the new
    /// active id.
    pub async fn publish(&self, documents: Vec<Document>) -> Result<String, PublishError> {
        let documents = if documents.is_empty() {
            log::warn!("No documents to publish, using a placeholder document");
            vec![placeholder_document()]
        } else {
            documents
        };

        let version = self.create_new_version(&documents).await?;

        log::info!("[{}] {version}", PublishStage::Validating);
        if !self.validator.validate(&self.store.version_path(&version)).await {
            self.discard(&version);
            return Err(PublishError::Validation { version });
        }

        if let Err(e) = self.activate(&version).await {
            self.discard(&version);
            return Err(e);
        }

        let removed = self.prune();
        log::info!(
            "[{}] published {version}, pruned {removed} old version(s)",
            PublishStage::Idle
        );
        Ok(version)
    }

    /// Build a new, inactive snapshot and return its id.
    ///
    /// A failed build leaves no directory behind.
    pub async fn create_new_version(&self, documents: &[Document]) -> Result<String, PublishError> {
        let version = self.store.next_version_id()?;
        let path = self.store.version_path(&version);
        log::info!(
            "[{}] {version} from {} documents",
            PublishStage::Building,
            documents.len()
        );

        let builder = IndexBuilder::new(self.engine.clone()).with_batch_size(self.batch_size);
        if let Err(source) = builder.build(documents, &path).await {
            log::error!("Failed to build {version}: {source}");
            self.discard(&version);
            return Err(PublishError::Build { version, source });
        }
        Ok(version)
    }

    /// Make an existing snapshot active.
    ///
    /// The snapshot must exist and pass validation. Nothing is deleted on
    /// failure, so this is also the way to roll back to a retained snapshot.
    pub async fn activate(&self, version: &str) -> Result<(), PublishError> {
        if !self.store.contains(version) {
            return Err(PublishError::Commit {
                version: version.to_string(),
                source: Error::not_found(format!("version {version} does not exist")),
            });
        }

        if !self.validator.validate(&self.store.version_path(version)).await {
            return Err(PublishError::Validation {
                version: version.to_string(),
            });
        }

        log::info!("[{}] {version}", PublishStage::Publishing);
        self.store
            .set_current_version(version)
            .map_err(|source| {
                log::error!("Failed to switch active version to {version}: {source}");
                PublishError::Commit {
                    version: version.to_string(),
                    source,
                }
            })
    }

    /// Delete snapshots beyond the retention limit, oldest first.
    ///
    /// The active snapshot is always kept and counts toward the limit.
    /// Deletion failures are logged and skipped. Returns the number of
    /// snapshots removed.
    pub fn prune(&self) -> usize {
        let versions = match self.store.list_versions() {
            Ok(versions) => versions,
            Err(e) => {
                log::error!("Failed to list versions for pruning: {e}");
                return 0;
            }
        };
        if versions.len() <= self.retention_limit {
            return 0;
        }

        let active_count = versions.iter().filter(|v| v.is_active).count();
        let newest_inactive = self.retention_limit.saturating_sub(active_count);
        let keep: HashSet<&str> = versions
            .iter()
            .filter(|v| v.is_active)
            .chain(versions.iter().filter(|v| !v.is_active).take(newest_inactive))
            .map(|v| v.id.as_str())
            .collect();

        let mut removed = 0;
        for version in versions.iter().rev().filter(|v| !keep.contains(v.id.as_str())) {
            match self.store.remove_version(&version.id) {
                Ok(()) => {
                    log::info!("Pruned old version {}", version.id);
                    removed += 1;
                }
                Err(e) => log::error!("Failed to prune {}: {e}", version.id),
            }
        }
        removed
    }

    fn discard(&self, version: &str) {
        match self.store.discard_version(version) {
            Ok(()) => log::warn!("Discarded candidate {version}"),
            Err(e) => log::error!("Failed to discard candidate {version}: {e}"),
        }
    }
}

fn placeholder_document() -> Document {
    Document::new(PLACEHOLDER_CONTENT).with_metadata("source", "placeholder")
}
