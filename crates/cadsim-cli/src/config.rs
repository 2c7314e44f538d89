//! TOML run configuration.
//!
//! ```toml
//! [build]
//! rigid_body_property = "Rigid Body"
//! strict = false
//!
//! [emit]
//! dummy_mass_fraction = 0.001
//! mesh_uri_prefix = "package://robot/meshes/"
//!
//! [mesh]
//! dir = "meshes"
//! format = "stl"
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cadsim_assembly::{BuildOptions, MeshOptions};
use cadsim_scene::EmitOptions;
use serde::Deserialize;

/// Options for every stage of a conversion. Missing sections use defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildOptions,
    pub emit: EmitOptions,
    pub mesh: MeshOptions,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadsim_assembly::MeshFormat;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = Config::parse(
            r#"
            [build]
            rigid_body_property = "Link"
            strict = true

            [emit]
            world_link = "ground"

            [mesh]
            format = "obj"
            "#,
        )
        .unwrap();
        assert_eq!(config.build.rigid_body_property, "Link");
        assert!(config.build.strict);
        assert_eq!(config.emit.world_link, "ground");
        assert_eq!(config.emit.dummy_mass_fraction, 0.001);
        assert_eq!(config.mesh.format, MeshFormat::Obj);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadsim.toml");
        fs::write(&path, "[build]\nstrict = \"yes\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("cadsim.toml"));
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
