#![warn(missing_docs)]

//! Data model for CAD-to-simulator conversion.
//!
//! Two halves live here. The payload types mirror what the CAD service
//! returns (assembly definitions, occurrences, mate features, mass
//! properties and metadata). The scene types describe the output: named
//! links with inertial and visual attributes, and the joints between them.
//!
//! Nothing in this crate talks to the network or walks a tree; it is the
//! shared vocabulary of the assembly builder and the scene emitter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod compact;
mod payload;
mod scene;

pub use payload::{
    metadata_flag, AssemblyDefinition, Feature, FeatureData, Instance, InstanceKind,
    MassProperties, MateType, MatedCs, MatedEntity, MetadataProperty, Occurrence, RootAssembly,
    SubAssembly,
};
pub use scene::{Inertial, InertiaTensor, Joint, JointKind, Link, SceneGraph, Visual};

/// How a document element revision is addressed by the CAD service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum VersionSelector {
    /// Mutable workspace head.
    Workspace(String),
    /// Named, immutable version.
    Version(String),
    /// Exact microversion.
    Microversion(String),
}

impl VersionSelector {
    /// Single-letter selector used in service URLs (`w`, `v` or `m`).
    pub fn wvm(&self) -> &'static str {
        match self {
            VersionSelector::Workspace(_) => "w",
            VersionSelector::Version(_) => "v",
            VersionSelector::Microversion(_) => "m",
        }
    }

    /// The workspace, version or microversion id.
    pub fn id(&self) -> &str {
        match self {
            VersionSelector::Workspace(id)
            | VersionSelector::Version(id)
            | VersionSelector::Microversion(id) => id,
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.wvm(), self.id())
    }
}

/// Error parsing a `w/<id>`, `v/<id>` or `m/<id>` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSelectorError(pub String);

impl fmt::Display for ParseSelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid version selector '{}', expected w/<id>, v/<id> or m/<id>",
            self.0
        )
    }
}

impl std::error::Error for ParseSelectorError {}

impl FromStr for VersionSelector {
    type Err = ParseSelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('/')
            .filter(|(_, id)| !id.is_empty())
            .ok_or_else(|| ParseSelectorError(s.to_string()))?;
        let id = id.to_string();
        match kind {
            "w" => Ok(VersionSelector::Workspace(id)),
            "v" => Ok(VersionSelector::Version(id)),
            "m" => Ok(VersionSelector::Microversion(id)),
            _ => Err(ParseSelectorError(s.to_string())),
        }
    }
}

/// Identity of an instanced definition: *what* is instanced, not *where*.
///
/// Identical definitions share mass properties and metadata no matter how
/// many times they are instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionId {
    /// Document containing the element.
    pub document_id: String,
    /// Part studio or assembly element.
    pub element_id: String,
    /// Revision of the document.
    pub version: VersionSelector,
    /// Part within a part studio; `None` for assemblies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
}

impl DefinitionId {
    /// Key used to de-duplicate mesh downloads (revision-independent).
    pub fn mesh_key(&self) -> MeshKey {
        MeshKey {
            document_id: self.document_id.clone(),
            element_id: self.element_id.clone(),
            part_id: self.part_id.clone(),
        }
    }

    /// File-name-safe stem identifying this definition in an export directory.
    ///
    /// Export directories hold a single revision, so the version is omitted.
    pub fn file_stem(&self) -> String {
        self.mesh_key().file_stem()
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.document_id, self.version, self.element_id)?;
        if let Some(part) = &self.part_id {
            write!(f, "#{}", part)?;
        }
        Ok(())
    }
}

/// Mesh identity: (document, element, optional part).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshKey {
    /// Document id.
    pub document_id: String,
    /// Element id.
    pub element_id: String,
    /// Part id, if the mesh is a single part.
    pub part_id: Option<String>,
}

impl MeshKey {
    /// File-name-safe stem for the downloaded mesh.
    pub fn file_stem(&self) -> String {
        let mut stem = format!("{}_{}", self.document_id, self.element_id);
        if let Some(part) = &self.part_id {
            stem.push('_');
            stem.push_str(part);
        }
        sanitize_stem(&stem)
    }
}

fn sanitize_stem(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Concatenation of ancestor occurrence ids down to one occurrence.
///
/// The empty path is the assembly root ("world").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrencePath(Vec<String>);

impl OccurrencePath {
    /// The root path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Wrap a list of instance ids.
    pub fn new(ids: Vec<String>) -> Self {
        Self(ids)
    }

    /// Path of a child instance beneath this one.
    pub fn child(&self, instance_id: &str) -> Self {
        let mut ids = self.0.clone();
        ids.push(instance_id.to_string());
        Self(ids)
    }

    /// `self` followed by every id of `relative`.
    pub fn join(&self, relative: &OccurrencePath) -> Self {
        let mut ids = self.0.clone();
        ids.extend(relative.0.iter().cloned());
        Self(ids)
    }

    /// Path with the last id removed; `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The instance ids, outermost first.
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    /// Last instance id, if any.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of ids in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no ids.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &OccurrencePath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<Vec<String>> for OccurrencePath {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl From<&[&str]> for OccurrencePath {
    fn from(ids: &[&str]) -> Self {
        Self(ids.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for OccurrencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("(root)")
        } else {
            f.write_str(&self.0.join("/"))
        }
    }
}
