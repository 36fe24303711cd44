//! Versioned vector index snapshots.
//!
//! Publishes a freshly built vector index without interrupting readers:
//! every rebuild lands in a new numbered snapshot directory, is probed with a
//! smoke query, and only then becomes active by rewriting a one-line pointer
//! file. Old snapshots beyond the retention limit are pruned afterwards; the
//! active one never is.
//!
//! # On-disk layout
//!
//! ```text
//! <base>/
//! ├── active_version.txt      # "chroma_v003"
//! ├── chroma_v001/            # one directory per snapshot
//! ├── chroma_v002/
//! └── chroma_v003/
//! ```
//!
//! # Components
//!
//! - [`VersionStore`]: naming, enumeration and the active pointer
//! - [`IndexBuilder`]: batched snapshot construction over a `VectorEngine`
//! - [`SnapshotValidator`] / [`SmokeValidator`]: probe query gate
//! - [`VersionManager`]: build → validate → switch → prune, with rollback
//!
//! # Concurrency
//!
//! One writer per base directory. `VersionManager::publish` takes no lock;
//! the caller (typically a scheduler running one ETL job at a time) must
//! not overlap publishes on the same base directory. Readers may resolve
//! [`VersionStore::active_path`] at any time.

pub mod builder;
pub mod manager;
pub mod store;
pub mod types;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::IndexBuilder;
pub use manager::{PublishError, PublishStage, VersionManager, PLACEHOLDER_CONTENT};
pub use store::VersionStore;
pub use types::{
    VersionInfo, VersionsConfig, ACTIVE_VERSION_FILE, DEFAULT_BATCH_SIZE,
    DEFAULT_RETENTION_LIMIT, DEFAULT_VERSION_PREFIX, VERSION_NUMBER_WIDTH,
};
pub use validator::{SmokeValidator, SnapshotValidator, PROBE_QUERY};
