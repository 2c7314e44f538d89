//! On-disk snapshot of everything fetched for one assembly.
//!
//! A snapshot holds the assembly definition plus every mass and metadata
//! record fetched while building it, so a repeated run can skip the CAD
//! service entirely. Entries are keyed by the SHA-256 of the document,
//! element and version selector. The file is an opaque JSON blob, not an
//! interchange format.

use std::fs;
use std::path::{Path, PathBuf};

use cadsim_ir::{AssemblyDefinition, DefinitionId, MassProperties, MetadataProperty, VersionSelector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{AssemblyError, Fetcher};

/// Cached data for one assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The assembly definition.
    pub definition: AssemblyDefinition,
    /// Mass properties by definition.
    pub mass: Vec<(DefinitionId, MassProperties)>,
    /// Metadata by definition.
    pub metadata: Vec<(DefinitionId, Vec<MetadataProperty>)>,
}

impl Snapshot {
    /// Capture the definition and everything `fetcher` fetched successfully.
    pub fn capture(definition: &AssemblyDefinition, fetcher: &Fetcher<'_>) -> Self {
        Self {
            definition: definition.clone(),
            mass: fetcher.cached_mass(),
            metadata: fetcher.cached_metadata(),
        }
    }
}

/// Directory of snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    /// Use `dir` for snapshot files. The directory is created on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex SHA-256 of the assembly identity.
    pub fn generate_key(document_id: &str, element_id: &str, version: &VersionSelector) -> String {
        let mut hasher = Sha256::new();
        hasher.update(document_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(element_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(version.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// File holding the snapshot for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load the snapshot for an assembly, if one is cached.
    pub fn load(
        &self,
        document_id: &str,
        element_id: &str,
        version: &VersionSelector,
    ) -> Result<Option<Snapshot>, AssemblyError> {
        let path = self.path_for(&Self::generate_key(document_id, element_id, version));
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_error(&path, e)),
        };
        let snapshot = serde_json::from_slice(&data).map_err(|e| cache_error(&path, e))?;
        debug!(path = %path.display(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    /// Store a snapshot, returning the file written.
    pub fn store(
        &self,
        document_id: &str,
        element_id: &str,
        version: &VersionSelector,
        snapshot: &Snapshot,
    ) -> Result<PathBuf, AssemblyError> {
        fs::create_dir_all(&self.dir).map_err(|e| cache_error(&self.dir, e))?;
        let path = self.path_for(&Self::generate_key(document_id, element_id, version));
        let data = serde_json::to_vec(snapshot).map_err(|e| cache_error(&path, e))?;
        fs::write(&path, &data).map_err(|e| cache_error(&path, e))?;
        debug!(path = %path.display(), size = data.len(), "snapshot stored");
        Ok(path)
    }
}

fn cache_error(path: &Path, e: impl std::fmt::Display) -> AssemblyError {
    AssemblyError::Cache {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
