//! Emitter options.

use cadsim_assembly::MeshFormat;
use serde::{Deserialize, Serialize};

/// Options for turning an assembly tree into a scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Mass of each intermediate link of a compound joint, as a fraction of
    /// the child link's mass.
    pub dummy_mass_fraction: f64,
    /// Lower bound on intermediate link mass in kg.
    pub min_dummy_mass: f64,
    /// Format assumed for mesh file names not taken from a download.
    pub mesh_format: MeshFormat,
    /// Prepended to every mesh file name in visuals.
    pub mesh_uri_prefix: String,
    /// Parent link name for mates attached to the assembly origin.
    pub world_link: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            dummy_mass_fraction: 0.001,
            min_dummy_mass: 1e-9,
            mesh_format: MeshFormat::Stl,
            mesh_uri_prefix: "meshes/".to_string(),
            world_link: "world".to_string(),
        }
    }
}

impl EmitOptions {
    /// Mass given to an intermediate link whose child weighs `child_mass`.
    pub fn dummy_mass(&self, child_mass: f64) -> f64 {
        (child_mass * self.dummy_mass_fraction).max(self.min_dummy_mass)
    }

    /// Visual URI for a mesh file name.
    pub fn mesh_uri(&self, file: &str) -> String {
        format!("{}{}", self.mesh_uri_prefix, file)
    }
}
