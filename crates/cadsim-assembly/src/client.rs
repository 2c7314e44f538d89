//! The CAD-service collaborator.
//!
//! Conversion code only sees [`CadClient`]. Network clients (request
//! signing, retries, pagination) implement it outside this crate;
//! [`DirectoryClient`] serves an offline export from disk and
//! [`MemoryClient`] serves fixtures from memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cadsim_ir::{
    AssemblyDefinition, DefinitionId, MassProperties, MeshKey, MetadataProperty, VersionSelector,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{ClientError, MeshFormat};

/// The four operations the converter needs from the CAD service.
///
/// Implementations must be shareable across fetch workers.
pub trait CadClient: Send + Sync {
    /// Assembly definition of `element_id` at `version`.
    fn fetch_assembly_definition(
        &self,
        document_id: &str,
        element_id: &str,
        version: &VersionSelector,
    ) -> Result<AssemblyDefinition, ClientError>;

    /// Mass properties of a part (when `id.part_id` is set) or an assembly.
    fn fetch_mass_properties(&self, id: &DefinitionId) -> Result<MassProperties, ClientError>;

    /// Metadata properties of a part or an element.
    fn fetch_metadata(&self, id: &DefinitionId) -> Result<Vec<MetadataProperty>, ClientError>;

    /// Exported mesh bytes.
    fn fetch_mesh_export(&self, id: &DefinitionId, format: MeshFormat) -> Result<Vec<u8>, ClientError>;
}

/// Status of a server-side export job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// `DONE`, `ACTIVE`, or a failure state.
    pub request_state: String,
    /// Ids of the produced data, once done.
    #[serde(default)]
    pub result_external_data_ids: Vec<String>,
}

/// Poll an export job until it reports `DONE`.
///
/// `ACTIVE` waits `delay` and polls again; any other state is an error.
/// Gives up with [`ClientError::JobTimeout`] after `max_polls` requests.
pub fn poll_until_done<F>(
    job: &str,
    delay: Duration,
    max_polls: u32,
    mut status: F,
) -> Result<JobStatus, ClientError>
where
    F: FnMut(&str) -> Result<JobStatus, ClientError>,
{
    for poll in 1..=max_polls {
        let current = status(job)?;
        match current.request_state.as_str() {
            "DONE" => return Ok(current),
            "ACTIVE" => {
                debug!(job, poll, "export job still active");
                if poll < max_polls {
                    thread::sleep(delay);
                }
            }
            other => {
                return Err(ClientError::JobFailed {
                    job: job.to_string(),
                    state: other.to_string(),
                })
            }
        }
    }
    Err(ClientError::JobTimeout {
        job: job.to_string(),
        polls: max_polls,
    })
}

/// Serves collaborator requests from an export directory.
///
/// Layout:
///
/// ```text
/// assembly.json
/// mass/<stem>.json
/// metadata/<stem>.json
/// meshes/<stem>.<ext>
/// ```
///
/// where `<stem>` is [`DefinitionId::file_stem`]. The mass and metadata files
/// hold the raw service responses. Metadata files are optional.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    root: PathBuf,
}

impl DirectoryClient {
    /// Serve from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The export directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the assembly definition.
    pub fn assembly_path(&self) -> PathBuf {
        self.root.join("assembly.json")
    }

    /// Path of the mass response for `id`.
    pub fn mass_path(&self, id: &DefinitionId) -> PathBuf {
        self.root.join("mass").join(format!("{}.json", id.file_stem()))
    }

    /// Path of the metadata response for `id`.
    pub fn metadata_path(&self, id: &DefinitionId) -> PathBuf {
        self.root.join("metadata").join(format!("{}.json", id.file_stem()))
    }

    /// Path of the exported mesh for `id`.
    pub fn mesh_path(&self, id: &DefinitionId, format: MeshFormat) -> PathBuf {
        self.root
            .join("meshes")
            .join(format!("{}.{}", id.file_stem(), format.extension()))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, ClientError> {
        debug!(path = %path.display(), "reading export file");
        fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ClientError::NotFound(path.display().to_string())
            } else {
                ClientError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }

    fn read_json(&self, path: &Path, what: &str) -> Result<Value, ClientError> {
        let bytes = self.read(path)?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Json {
            what: what.to_string(),
            source,
        })
    }
}

impl CadClient for DirectoryClient {
    fn fetch_assembly_definition(
        &self,
        document_id: &str,
        element_id: &str,
        version: &VersionSelector,
    ) -> Result<AssemblyDefinition, ClientError> {
        debug!(document_id, element_id, %version, "loading assembly definition from export");
        let bytes = self.read(&self.assembly_path())?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Json {
            what: "assembly definition".to_string(),
            source,
        })
    }

    fn fetch_mass_properties(&self, id: &DefinitionId) -> Result<MassProperties, ClientError> {
        let value = self.read_json(&self.mass_path(id), "mass properties")?;
        MassProperties::from_response(&value, id.part_id.as_deref()).map_err(|source| {
            ClientError::Json {
                what: "mass properties".to_string(),
                source,
            }
        })
    }

    /// A definition without a metadata file has no properties.
    fn fetch_metadata(&self, id: &DefinitionId) -> Result<Vec<MetadataProperty>, ClientError> {
        let value = match self.read_json(&self.metadata_path(id), "metadata") {
            Ok(value) => value,
            Err(ClientError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        MetadataProperty::list_from_response(&value).map_err(|source| ClientError::Json {
            what: "metadata".to_string(),
            source,
        })
    }

    fn fetch_mesh_export(&self, id: &DefinitionId, format: MeshFormat) -> Result<Vec<u8>, ClientError> {
        self.read(&self.mesh_path(id, format))
    }
}

/// Per-operation request counts of a [`MemoryClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Assembly definition requests.
    pub definition: usize,
    /// Mass-property requests.
    pub mass: usize,
    /// Metadata requests.
    pub metadata: usize,
    /// Mesh export requests.
    pub mesh: usize,
}

/// In-memory client that counts every request.
///
/// Definitions without registered metadata report no properties; missing
/// mass properties and meshes are [`ClientError::NotFound`].
#[derive(Debug, Default)]
pub struct MemoryClient {
    definition: AssemblyDefinition,
    mass: HashMap<DefinitionId, MassProperties>,
    metadata: HashMap<DefinitionId, Vec<MetadataProperty>>,
    meshes: HashMap<MeshKey, Vec<u8>>,
    definition_calls: AtomicUsize,
    mass_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    mesh_calls: AtomicUsize,
}

impl MemoryClient {
    /// Serve `definition`.
    pub fn new(definition: AssemblyDefinition) -> Self {
        Self {
            definition,
            ..Default::default()
        }
    }

    /// Register mass properties for `id`.
    pub fn with_mass(mut self, id: DefinitionId, mass: MassProperties) -> Self {
        self.mass.insert(id, mass);
        self
    }

    /// Register metadata for `id`.
    pub fn with_metadata(mut self, id: DefinitionId, properties: Vec<MetadataProperty>) -> Self {
        self.metadata.insert(id, properties);
        self
    }

    /// Mark `id` as a rigid body through the default metadata property.
    pub fn with_rigid(self, id: DefinitionId) -> Self {
        self.with_metadata(
            id,
            vec![MetadataProperty {
                name: crate::DEFAULT_RIGID_BODY_PROPERTY.to_string(),
                value: Value::Bool(true),
            }],
        )
    }

    /// Register mesh bytes for the mesh identity of `id`.
    pub fn with_mesh(mut self, id: &DefinitionId, bytes: Vec<u8>) -> Self {
        self.meshes.insert(id.mesh_key(), bytes);
        self
    }

    /// Requests served so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            definition: self.definition_calls.load(Ordering::SeqCst),
            mass: self.mass_calls.load(Ordering::SeqCst),
            metadata: self.metadata_calls.load(Ordering::SeqCst),
            mesh: self.mesh_calls.load(Ordering::SeqCst),
        }
    }
}

impl CadClient for MemoryClient {
    fn fetch_assembly_definition(
        &self,
        _document_id: &str,
        _element_id: &str,
        _version: &VersionSelector,
    ) -> Result<AssemblyDefinition, ClientError> {
        self.definition_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.definition.clone())
    }

    fn fetch_mass_properties(&self, id: &DefinitionId) -> Result<MassProperties, ClientError> {
        self.mass_calls.fetch_add(1, Ordering::SeqCst);
        self.mass
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("mass properties for {id}")))
    }

    fn fetch_metadata(&self, id: &DefinitionId) -> Result<Vec<MetadataProperty>, ClientError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.get(id).cloned().unwrap_or_default())
    }

    fn fetch_mesh_export(&self, id: &DefinitionId, _format: MeshFormat) -> Result<Vec<u8>, ClientError> {
        self.mesh_calls.fetch_add(1, Ordering::SeqCst);
        self.meshes
            .get(&id.mesh_key())
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("mesh for {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn status(state: &str) -> JobStatus {
        JobStatus {
            request_state: state.to_string(),
            result_external_data_ids: if state == "DONE" { vec!["fid".into()] } else { vec![] },
        }
    }

    #[test]
    fn test_poll_waits_for_done() {
        let states = RefCell::new(vec!["DONE", "ACTIVE", "ACTIVE"]);
        let result = poll_until_done("job", Duration::ZERO, 10, |_| {
            Ok(status(states.borrow_mut().pop().unwrap()))
        })
        .unwrap();
        assert_eq!(result.result_external_data_ids, vec!["fid".to_string()]);
        assert!(states.borrow().is_empty());
    }

    #[test]
    fn test_poll_fails_on_other_state() {
        let err = poll_until_done("job", Duration::ZERO, 10, |_| Ok(status("FAILED"))).unwrap_err();
        assert!(matches!(err, ClientError::JobFailed { ref state, .. } if state == "FAILED"));
    }

    #[test]
    fn test_poll_times_out() {
        let mut calls = 0;
        let err = poll_until_done("job", Duration::ZERO, 3, |_| {
            calls += 1;
            Ok(status("ACTIVE"))
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::JobTimeout { polls: 3, .. }));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_directory_client_reads_layout() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryClient::new(dir.path());
        let id = DefinitionId {
            document_id: "d".into(),
            element_id: "e".into(),
            version: VersionSelector::Microversion("m".into()),
            part_id: Some("P".into()),
        };

        fs::create_dir_all(dir.path().join("mass")).unwrap();
        fs::write(
            client.mass_path(&id),
            r#"{"bodies": {"P": {"mass": [1.5], "hasMass": true, "volume": [0.1],
                "centroid": [0, 0, 0], "inertia": [1,0,0,0,1,0,0,0,1]}}}"#,
        )
        .unwrap();
        let mass = client.fetch_mass_properties(&id).unwrap();
        assert_eq!(mass.mass, 1.5);

        fs::remove_file(client.mass_path(&id)).unwrap();
        let err = client.fetch_mass_properties(&id).unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn test_directory_client_missing_metadata_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let client = DirectoryClient::new(dir.path());
        let id = DefinitionId {
            document_id: "d".into(),
            element_id: "e".into(),
            version: VersionSelector::Microversion("m".into()),
            part_id: Some("P".into()),
        };
        assert!(client.fetch_metadata(&id).unwrap().is_empty());

        fs::create_dir_all(dir.path().join("metadata")).unwrap();
        fs::write(client.metadata_path(&id), "not json").unwrap();
        let err = client.fetch_metadata(&id).unwrap_err();
        assert!(matches!(err, ClientError::Json { .. }));
    }
}
