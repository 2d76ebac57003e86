#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Persistent cache of resolved groups.
//!
//! One JSON snapshot file per configuration holds every group that has ever
//! been fetched (and passed the name filter) for that configuration. The
//! file is read in full when the store is opened and rewritten in full after
//! every append, so a run that dies part way still keeps everything resolved
//! up to that point and never pays for those lookups again.
//!
//! The store only grows. Filter-derived attributes are stripped before a
//! group is written.

pub mod paths;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use group_scout_group_models::{Group, GroupId};
use serde::{Deserialize, Serialize};

/// Current snapshot layout version.
const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur while reading or writing the group store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the snapshot file failed.
    #[error("I/O error on group store {}: {source}", .path.display())]
    Io {
        /// Snapshot file path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The snapshot exists but cannot be decoded.
    #[error("Group store {} is corrupt: {source}", .path.display())]
    Corrupt {
        /// Snapshot file path.
        path: PathBuf,
        /// Decoder diagnostic.
        source: serde_json::Error,
    },

    /// The snapshot was written by an incompatible version.
    #[error("Group store {} has unsupported version {version}", .path.display())]
    UnsupportedVersion {
        /// Snapshot file path.
        path: PathBuf,
        /// Version found in the file.
        version: u32,
    },

    /// A group id appears more than once.
    #[error("Group {id} is already in the store")]
    DuplicateId {
        /// The repeated id.
        id: GroupId,
    },

    /// Encoding the snapshot failed.
    #[error("Failed to encode group store: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    groups: Vec<Group>,
}

/// Reads every cached group from `path`.
///
/// A missing file is an empty cache. A file whose existence cannot be
/// checked is an error, not a missing file.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be read or decoded,
/// or if it holds the same id twice.
pub fn load(path: &Path) -> Result<Vec<Group>, StoreError> {
    let exists = path.try_exists().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !exists {
        log::debug!("No group store at {}, starting empty", path.display());
        return Ok(Vec::new());
    }

    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: Snapshot =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: snapshot.version,
        });
    }

    Ok(snapshot.groups)
}

/// Keyed, append-only cache of groups backed by a single snapshot file.
#[derive(Debug)]
pub struct GroupStore {
    path: PathBuf,
    groups: Vec<Group>,
    index: BTreeMap<GroupId, usize>,
}

impl GroupStore {
    /// Opens the store at `path`, loading any existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an existing snapshot cannot be read or is
    /// corrupt. Callers should treat this as fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let groups = load(&path)?;

        let mut index = BTreeMap::new();
        for (i, group) in groups.iter().enumerate() {
            if index.insert(group.id.clone(), i).is_some() {
                return Err(StoreError::DuplicateId {
                    id: group.id.clone(),
                });
            }
        }

        if !groups.is_empty() {
            log::info!(
                "Found group store on disk with {} group(s): {}",
                groups.len(),
                path.display()
            );
        }

        Ok(Self {
            path,
            groups,
            index,
        })
    }

    /// Snapshot file backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All cached groups in insertion order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &GroupId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn get_by_id(&self, id: &GroupId) -> Option<&Group> {
        self.index.get(id).map(|&i| &self.groups[i])
    }

    /// Adds a group and rewrites the whole snapshot.
    ///
    /// Filter-derived attributes are not stored. The in-memory collection is
    /// only updated once the snapshot has been written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is already cached, or
    /// an I/O or encoding error if the snapshot cannot be written.
    pub fn append_and_persist(&mut self, group: &Group) -> Result<(), StoreError> {
        if self.contains(&group.id) {
            return Err(StoreError::DuplicateId {
                id: group.id.clone(),
            });
        }

        self.groups.push(group.without_annotations());
        if let Err(e) = self.persist() {
            self.groups.pop();
            return Err(e);
        }
        self.index.insert(group.id.clone(), self.groups.len() - 1);

        log::debug!(
            "Stored group {} ({}) - {} cached",
            group.id,
            group.name,
            self.groups.len()
        );
        Ok(())
    }

    /// Writes the full snapshot to a staging file, then renames it into
    /// place so readers never see a partial file.
    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            paths::ensure_dir(parent).map_err(io_err)?;
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            groups: self.groups.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let staging = paths::staging_path(&self.path);
        std::fs::write(&staging, bytes).map_err(io_err)?;
        std::fs::rename(&staging, &self.path).map_err(io_err)?;
        Ok(())
    }
}
