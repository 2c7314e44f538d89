//! Build and mesh options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the metadata property marking a node as one simulation link.
pub const DEFAULT_RIGID_BODY_PROPERTY: &str = "Rigid Body";

/// Options for tree construction and data fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Boolean metadata property that marks a rigid body.
    pub rigid_body_property: String,
    /// Further metadata properties kept on each node.
    pub extra_metadata: Vec<String>,
    /// Escalate per-definition fetch failures to fatal errors.
    pub strict: bool,
    /// Worker threads for parallel fetches; 0 uses the global pool.
    pub fetch_workers: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            rigid_body_property: DEFAULT_RIGID_BODY_PROPERTY.to_string(),
            extra_metadata: Vec::new(),
            strict: false,
            fetch_workers: 0,
        }
    }
}

impl BuildOptions {
    /// Whether `name` is one of the metadata properties this run keeps.
    pub fn is_recognized(&self, name: &str) -> bool {
        name == self.rigid_body_property || self.extra_metadata.iter().any(|n| n == name)
    }
}

/// Mesh export format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    /// Binary STL.
    #[default]
    Stl,
    /// Wavefront OBJ.
    Obj,
}

impl MeshFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
        }
    }
}

/// Options for the mesh download pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Directory the meshes are written to.
    pub dir: PathBuf,
    /// Export format.
    pub format: MeshFormat,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("meshes"),
            format: MeshFormat::Stl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = BuildOptions::default();
        assert_eq!(opts.rigid_body_property, "Rigid Body");
        assert!(opts.is_recognized("Rigid Body"));
        assert!(!opts.is_recognized("Material"));
        assert_eq!(MeshOptions::default().format.extension(), "stl");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: BuildOptions =
            serde_json::from_str(r#"{"strict": true, "extra_metadata": ["Material"]}"#).unwrap();
        assert!(opts.strict);
        assert!(opts.is_recognized("Material"));
        assert_eq!(opts.rigid_body_property, "Rigid Body");

        let mesh: MeshOptions = serde_json::from_str(r#"{"format": "obj"}"#).unwrap();
        assert_eq!(mesh.format, MeshFormat::Obj);
        assert_eq!(mesh.dir, PathBuf::from("meshes"));
    }
}
