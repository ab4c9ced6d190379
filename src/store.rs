//! Persisting snapshots to disk.
//!
//! Each repository gets its own directory under the store's root, and each
//! resource is a single JSON file in that directory containing a
//! [`Snapshot`] envelope. A snapshot is only ever replaced wholesale.

use chrono::{DateTime, SubsecRound, Utc};
use failure::{Error, ResultExt};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::repo::RepoId;
use crate::resource::{Resource, Source};

/// The metadata stored alongside every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub fetched_at: DateTime<Utc>,
    pub source: Source,
    pub endpoint: String,
    pub owner: String,
    pub repo: String,
    /// Set when a paginated fetch stopped because a request failed, rather
    /// than because it ran out of data.
    #[serde(default, skip_serializing_if = "is_false")]
    pub truncated: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A single resource, as it is stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "_meta")]
    pub meta: Meta,
    pub data: Value,
}

/// The provenance of a payload being written, everything in [`Meta`] the
/// store can't work out for itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub source: Source,
    pub endpoint: String,
    pub truncated: bool,
}

impl Origin {
    pub fn of(resource: Resource) -> Origin {
        Origin {
            source: resource.source(),
            endpoint: resource.endpoint().to_string(),
            truncated: false,
        }
    }

    pub fn truncated(mut self, truncated: bool) -> Origin {
        self.truncated = truncated;
        self
    }
}

/// Does this look like a `{"_meta": ..., "data": ...}` envelope?
fn is_envelope(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => obj.contains_key("_meta") && obj.contains_key("data"),
        None => false,
    }
}

/// Somewhere snapshots can be kept.
pub trait SnapshotStore {
    /// Has this resource already been captured? Empty files, malformed JSON,
    /// and anything without both `_meta` and `data` count as missing.
    fn exists_and_valid(&self, repo: &RepoId, resource: Resource) -> bool;

    /// Load a previously written snapshot, if there is one.
    fn read(&self, repo: &RepoId, resource: Resource) -> Result<Option<Snapshot>, Error>;

    /// Atomically write (or replace) a snapshot.
    fn write(
        &self,
        repo: &RepoId,
        resource: Resource,
        data: Value,
        origin: Origin,
    ) -> Result<Snapshot, Error>;
}

/// A [`SnapshotStore`] backed by a directory tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> FsStore {
        FsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_dir(&self, repo: &RepoId) -> PathBuf {
        self.root.join(repo.dir_name())
    }

    pub fn path(&self, repo: &RepoId, resource: Resource) -> PathBuf {
        self.repo_dir(repo).join(resource.file_name())
    }

    fn load(path: &Path) -> Result<Snapshot, Error> {
        let contents = fs::read_to_string(path)
            .with_context(|_| format!("Unable to read {}", path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|_| format!("{} isn't a valid snapshot", path.display()))?;

        Ok(snapshot)
    }
}

impl SnapshotStore for FsStore {
    fn exists_and_valid(&self, repo: &RepoId, resource: Resource) -> bool {
        let path = self.path(repo, resource);

        match fs::metadata(&path) {
            Ok(ref m) if m.len() > 0 => {}
            _ => return false,
        }

        let parsed = fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|contents| serde_json::from_str::<Value>(&contents).map_err(Error::from));

        match parsed {
            Ok(ref value) if is_envelope(value) => true,
            Ok(_) => {
                debug!("Treating {} as missing, it isn't a snapshot", path.display());
                false
            }
            Err(e) => {
                debug!("Treating {} as missing, {}", path.display(), e);
                false
            }
        }
    }

    fn read(&self, repo: &RepoId, resource: Resource) -> Result<Option<Snapshot>, Error> {
        let path = self.path(repo, resource);

        if !path.exists() {
            return Ok(None);
        }

        FsStore::load(&path).map(Some)
    }

    fn write(
        &self,
        repo: &RepoId,
        resource: Resource,
        data: Value,
        origin: Origin,
    ) -> Result<Snapshot, Error> {
        let dir = self.repo_dir(repo);
        fs::create_dir_all(&dir)
            .with_context(|_| format!("Couldn't create {}", dir.display()))?;

        let mut fetched_at = Utc::now().trunc_subsecs(0);

        // A replaced snapshot never goes backwards in time, even if the
        // clock does.
        if let Ok(Some(previous)) = self.read(repo, resource) {
            if previous.meta.fetched_at > fetched_at {
                fetched_at = previous.meta.fetched_at;
            }
        }

        let snapshot = Snapshot {
            meta: Meta {
                fetched_at,
                source: origin.source,
                endpoint: origin.endpoint,
                owner: repo.owner.clone(),
                repo: repo.name.clone(),
                truncated: origin.truncated,
            },
            data,
        };

        let path = self.path(repo, resource);
        let temp = dir.join(format!(".{}.tmp", resource.file_name()));

        let serialized =
            serde_json::to_string_pretty(&snapshot).context("Unable to serialize the snapshot")?;
        fs::write(&temp, serialized)
            .with_context(|_| format!("Unable to write {}", temp.display()))?;
        fs::rename(&temp, &path)
            .with_context(|_| format!("Unable to move the snapshot into {}", path.display()))?;

        info!("Saved {}", path.display());
        Ok(snapshot)
    }
}
