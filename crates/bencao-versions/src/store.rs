//! Filesystem naming, enumeration and the active pointer.
//!
//! The store knows nothing about index contents. A snapshot is any directory
//! directly under the base directory named `<prefix><digits>`; everything
//! else there is ignored.

use crate::types::{VersionInfo, ACTIVE_VERSION_FILE, DEFAULT_VERSION_PREFIX, VERSION_NUMBER_WIDTH};
use bencao_core::{Error, Result};
use chrono::{DateTime, Local};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot naming and pointer persistence for one base directory.
#[derive(Debug, Clone)]
pub struct VersionStore {
    base_dir: PathBuf,
    prefix: String,
    remove_dir: fn(&Path) -> io::Result<()>,
}

impl VersionStore {
    /// Create a store over `base_dir` with the default `chroma_v` prefix.
    ///
    /// The directory does not need to exist yet.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            prefix: DEFAULT_VERSION_PREFIX.to_string(),
            remove_dir: |path| std::fs::remove_dir_all(path),
        }
    }

    /// Use a different snapshot name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replace the function that deletes snapshot directories.
    #[cfg(test)]
    pub(crate) fn with_remover(mut self, remove_dir: fn(&Path) -> io::Result<()>) -> Self {
        self.remove_dir = remove_dir;
        self
    }

    /// The base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The snapshot name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path of the active-pointer file.
    pub fn pointer_path(&self) -> PathBuf {
        self.base_dir.join(ACTIVE_VERSION_FILE)
    }

    /// Directory of the snapshot named `id`.
    pub fn version_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(id)
    }

    /// Whether a snapshot directory named `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.parse_version_number(id).is_some() && self.version_path(id).is_dir()
    }

    /// Format a version number as an id, e.g. `7` → `chroma_v007`.
    pub fn format_version_id(&self, number: u32) -> String {
        format!(
            "{}{:0width$}",
            self.prefix,
            number,
            width = VERSION_NUMBER_WIDTH
        )
    }

    /// Extract the number from a well-formed version id.
    pub fn parse_version_number(&self, name: &str) -> Option<u32> {
        let digits = name.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// The id the next snapshot should use.
    ///
    /// One past the highest number among snapshots that exist right now, or
    /// version 1 when there are none. Deleting the highest-numbered
    /// snapshots lets the sequence step back. Fails once the highest number
    /// is `u32::MAX`.
    pub fn next_version_id(&self) -> Result<String> {
        let max = self
            .scan()?
            .iter()
            .map(|snapshot| snapshot.number)
            .max()
            .unwrap_or(0);
        let next = max.checked_add(1).ok_or_else(|| {
            Error::invalid_data(format!(
                "version numbers exhausted: {} exists",
                self.format_version_id(max)
            ))
        })?;
        Ok(self.format_version_id(next))
    }

    /// All snapshots, newest creation time first.
    ///
    /// Equal timestamps fall back to the higher version number first.
    pub fn list_versions(&self) -> Result<Vec<VersionInfo>> {
        let current = self.current_version()?;
        let mut snapshots = self.scan()?;
        snapshots.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.number.cmp(&a.number))
        });

        Ok(snapshots
            .into_iter()
            .map(|snapshot| VersionInfo {
                is_active: current.as_deref() == Some(snapshot.id.as_str()),
                created_at: DateTime::<Local>::from(snapshot.created),
                path: self.version_path(&snapshot.id),
                id: snapshot.id,
                number: snapshot.number,
            })
            .collect())
    }

    /// The id named by the pointer file, if any.
    ///
    /// A missing or blank pointer file means no version is active. A pointer
    /// whose content is not a version id is rejected.
    pub fn current_version(&self) -> Result<Option<String>> {
        let path = self.pointer_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(e, &path)),
        };

        let id = content.trim();
        if id.is_empty() {
            return Ok(None);
        }
        if self.parse_version_number(id).is_none() {
            return Err(Error::invalid_data(format!(
                "{} does not hold a version id: {id:?}",
                path.display()
            )));
        }
        Ok(Some(id.to_string()))
    }

    /// Point readers at `id`.
    ///
    /// The new content goes to a sibling temp file that is then renamed over
    /// the pointer, so the pointer is always either the old or the new id.
    pub fn set_current_version(&self, id: &str) -> Result<()> {
        if self.parse_version_number(id).is_none() {
            return Err(Error::invalid_data(format!("not a version id: {id:?}")));
        }
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| Error::io_with_path(e, &self.base_dir))?;

        let path = self.pointer_path();
        let tmp_path = path.with_extension("txt.tmp");
        std::fs::write(&tmp_path, id).map_err(|e| Error::io_with_path(e, &tmp_path))?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Error::io_with_path(e, &path));
        }
        Ok(())
    }

    /// Directory of the active snapshot, if one is active.
    ///
    /// Returns `None` when the pointer names a directory that no longer
    /// exists.
    pub fn active_path(&self) -> Result<Option<PathBuf>> {
        let Some(id) = self.current_version()? else {
            return Ok(None);
        };
        let path = self.version_path(&id);
        if !path.is_dir() {
            log::warn!(
                "Active version {id} points at missing directory {}",
                path.display()
            );
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Delete a snapshot directory and everything in it.
    pub(crate) fn remove_version(&self, id: &str) -> Result<()> {
        if self.parse_version_number(id).is_none() {
            return Err(Error::invalid_data(format!("not a version id: {id:?}")));
        }
        let path = self.version_path(id);
        (self.remove_dir)(&path).map_err(|e| Error::io_with_path(e, &path))
    }

    /// Delete a snapshot directory if it exists.
    pub(crate) fn discard_version(&self, id: &str) -> Result<()> {
        match self.remove_version(id) {
            Err(Error::IoPath { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn scan(&self) -> Result<Vec<ScannedSnapshot>> {
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_with_path(e, &self.base_dir)),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io_with_path(e, &self.base_dir))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(number) = self.parse_version_number(&name) else {
                continue;
            };
            let metadata = entry
                .metadata()
                .map_err(|e| Error::io_with_path(e, entry.path()))?;
            if !metadata.is_dir() {
                continue;
            }
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            snapshots.push(ScannedSnapshot {
                id: name,
                number,
                created,
            });
        }
        Ok(snapshots)
    }
}

struct ScannedSnapshot {
    id: String,
    number: u32,
    created: SystemTime,
}
