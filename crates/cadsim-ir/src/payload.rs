//! Payload types returned by the CAD service.
//!
//! Field names follow the service's camelCase JSON. Unknown fields are
//! ignored, and optional ones default, so real responses with extra keys
//! deserialize cleanly.

use cadsim_math::{Mat3, Point3, Transform, Vec3};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DefinitionId, OccurrencePath, VersionSelector};

/// Full assembly-definition response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyDefinition {
    /// The requested assembly.
    pub root_assembly: RootAssembly,
    /// Every distinct subassembly definition reachable from the root, once each.
    #[serde(default)]
    pub sub_assemblies: Vec<SubAssembly>,
}

impl AssemblyDefinition {
    /// Parse a response body.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize back to JSON (used by the snapshot cache).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The root assembly: its own instances and mates plus the flattened
/// occurrence list for the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootAssembly {
    /// Document id.
    #[serde(default)]
    pub document_id: String,
    /// Element id.
    #[serde(default)]
    pub element_id: String,
    /// Microversion the definition was read at.
    #[serde(default)]
    pub document_microversion: Option<String>,
    /// Direct children.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Mate features defined in the root.
    #[serde(default)]
    pub features: Vec<Feature>,
    /// One record per occurrence anywhere in the tree, with world transforms.
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
}

/// A subassembly definition, shared by all of its instantiations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAssembly {
    /// Document id.
    #[serde(default)]
    pub document_id: String,
    /// Element id; the stable key for the definition.
    pub element_id: String,
    /// Microversion.
    #[serde(default)]
    pub document_microversion: Option<String>,
    /// Children, with ids relative to this subassembly.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Mate features, with occurrence paths relative to this subassembly.
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Whether an instance is a part or an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceKind {
    /// A part from a part studio; always a leaf.
    Part,
    /// A nested assembly; always a branch.
    Assembly,
}

/// One child entry of an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Instance id, unique within its parent assembly.
    pub id: String,
    /// Display name, e.g. `"Wheel <2>"`.
    pub name: String,
    /// Part or assembly.
    #[serde(rename = "type")]
    pub kind: InstanceKind,
    /// Document holding the instanced element.
    pub document_id: String,
    /// Instanced element.
    pub element_id: String,
    /// Part id, for parts.
    #[serde(default)]
    pub part_id: Option<String>,
    /// Named version, when the instance references one.
    #[serde(default)]
    pub document_version: Option<String>,
    /// Microversion.
    #[serde(default)]
    pub document_microversion: Option<String>,
    /// Configuration string.
    #[serde(default)]
    pub configuration: Option<String>,
    /// Suppressed instances have no occurrence and are skipped.
    #[serde(default)]
    pub suppressed: bool,
}

impl Instance {
    /// Whether this is a part.
    pub fn is_part(&self) -> bool {
        self.kind == InstanceKind::Part
    }

    /// Revision selector: version, else microversion, else `fallback`.
    pub fn version_selector(&self, fallback: &VersionSelector) -> VersionSelector {
        if let Some(v) = &self.document_version {
            VersionSelector::Version(v.clone())
        } else if let Some(m) = &self.document_microversion {
            VersionSelector::Microversion(m.clone())
        } else {
            fallback.clone()
        }
    }

    /// Identity of what this instance references.
    pub fn definition_id(&self, fallback: &VersionSelector) -> DefinitionId {
        DefinitionId {
            document_id: self.document_id.clone(),
            element_id: self.element_id.clone(),
            version: self.version_selector(fallback),
            part_id: if self.is_part() { self.part_id.clone() } else { None },
        }
    }
}

/// Placement of one occurrence in the root frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// Instance ids from the root down to this occurrence.
    pub path: Vec<String>,
    /// Row-major 4x4 world transform.
    pub transform: Vec<f64>,
    /// Hidden in the CAD view.
    #[serde(default)]
    pub hidden: bool,
    /// Fixed in the CAD view.
    #[serde(default)]
    pub fixed: bool,
}

impl Occurrence {
    /// The occurrence path.
    pub fn occurrence_path(&self) -> OccurrencePath {
        OccurrencePath::new(self.path.clone())
    }

    /// The world transform, if it has the expected 16 entries.
    pub fn world_transform(&self) -> Option<Transform> {
        Transform::from_row_major(&self.transform)
    }
}

/// An assembly feature. Only mates carry `featureData` with mated entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Feature id.
    #[serde(default)]
    pub id: String,
    /// Feature type, e.g. `"mate"`, `"mateConnector"`, `"mateGroup"`.
    #[serde(default)]
    pub feature_type: Option<String>,
    /// Suppressed features are ignored.
    #[serde(default)]
    pub suppressed: bool,
    /// Mate details.
    pub feature_data: FeatureData,
}

impl Feature {
    /// Whether this feature is an active mate.
    pub fn is_mate(&self) -> bool {
        !self.suppressed
            && self.feature_type.as_deref().map_or(true, |t| t == "mate")
            && self.feature_data.mate_type.is_some()
    }
}

/// Payload of a mate feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureData {
    /// Mate name, used as the joint name.
    #[serde(default)]
    pub name: String,
    /// Mate type; absent for non-mate features.
    #[serde(default)]
    pub mate_type: Option<MateType>,
    /// The two mated sides.
    #[serde(default)]
    pub mated_entities: Vec<MatedEntity>,
}

/// CAD mate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MateType {
    /// Rotation about Z.
    Revolute,
    /// Rigid attachment.
    Fastened,
    /// Translation along Z.
    Slider,
    /// Spherical.
    Ball,
    /// Translation in XY plus rotation about Z.
    Planar,
    /// Translation along and rotation about Z.
    Cylindrical,
    /// Pin in slot.
    PinSlot,
    /// Parallel constraint.
    Parallel,
    /// Tangent constraint.
    Tangent,
    /// Any type this crate does not know.
    #[serde(other)]
    Unknown,
}

impl MateType {
    /// Upper-case name as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            MateType::Revolute => "REVOLUTE",
            MateType::Fastened => "FASTENED",
            MateType::Slider => "SLIDER",
            MateType::Ball => "BALL",
            MateType::Planar => "PLANAR",
            MateType::Cylindrical => "CYLINDRICAL",
            MateType::PinSlot => "PIN_SLOT",
            MateType::Parallel => "PARALLEL",
            MateType::Tangent => "TANGENT",
            MateType::Unknown => "UNKNOWN",
        }
    }
}

/// One side of a mate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatedEntity {
    /// Path relative to the assembly defining the mate; empty for the origin.
    #[serde(default)]
    pub mated_occurrence: Vec<String>,
    /// Mate connector frame in the mated occurrence's frame.
    #[serde(rename = "matedCS")]
    pub mated_cs: MatedCs,
}

/// Mate connector coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatedCs {
    /// X axis.
    pub x_axis: [f64; 3],
    /// Y axis.
    pub y_axis: [f64; 3],
    /// Z axis.
    pub z_axis: [f64; 3],
    /// Origin.
    pub origin: [f64; 3],
}

impl MatedCs {
    /// Local frame as a transform; axes become rotation columns.
    pub fn to_transform(&self) -> Transform {
        Transform::compose_mate_frame(
            &Vec3::from(self.x_axis),
            &Vec3::from(self.y_axis),
            &Vec3::from(self.z_axis),
            &Vec3::from(self.origin),
        )
    }
}

/// Mass properties of one definition in its own element frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassProperties {
    /// Mass in kg.
    pub mass: f64,
    /// Whether the service had material data to compute a mass.
    pub has_mass: bool,
    /// Volume in m³.
    pub volume: f64,
    /// Center of mass.
    pub centroid: [f64; 3],
    /// Row-major inertia tensor about the center of mass.
    pub inertia: [f64; 9],
}

/// A numeric field that is either a bare number or `[value, min, max]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Measured {
    Scalar(f64),
    List(Vec<f64>),
}

impl Measured {
    fn value(&self) -> Option<f64> {
        match self {
            Measured::Scalar(v) => Some(*v),
            Measured::List(v) => v.first().copied(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMassRecord {
    mass: Measured,
    #[serde(default = "default_true")]
    has_mass: bool,
    #[serde(default)]
    volume: Option<Measured>,
    centroid: Vec<f64>,
    inertia: Vec<f64>,
}

fn default_true() -> bool {
    true
}

impl MassProperties {
    /// Zero mass at the element origin.
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            has_mass: false,
            volume: 0.0,
            centroid: [0.0; 3],
            inertia: [0.0; 9],
        }
    }

    /// Parse a mass-properties response.
    ///
    /// Part responses wrap records in a `bodies` map keyed by part id; the
    /// entry for `part_id` is used, or the only entry when no id is given.
    /// Assembly responses are a flat record. Measured fields may be
    /// `[value, min, max]`; only the value is kept.
    pub fn from_response(response: &Value, part_id: Option<&str>) -> Result<Self, serde_json::Error> {
        let record = match response.get("bodies").and_then(Value::as_object) {
            Some(bodies) => match part_id {
                Some(id) => bodies.get(id).ok_or_else(|| {
                    serde_json::Error::custom(format!("no mass record for part '{id}'"))
                })?,
                None => bodies
                    .values()
                    .next()
                    .ok_or_else(|| serde_json::Error::custom("empty bodies map"))?,
            },
            None => response,
        };
        let raw: RawMassRecord = serde_json::from_value(record.clone())?;

        let mass = raw
            .mass
            .value()
            .ok_or_else(|| serde_json::Error::custom("empty mass field"))?;
        if raw.centroid.len() < 3 {
            return Err(serde_json::Error::custom("centroid needs 3 values"));
        }
        if raw.inertia.len() < 9 {
            return Err(serde_json::Error::custom("inertia needs 9 values"));
        }
        let mut centroid = [0.0; 3];
        centroid.copy_from_slice(&raw.centroid[..3]);
        let mut inertia = [0.0; 9];
        inertia.copy_from_slice(&raw.inertia[..9]);

        Ok(Self {
            mass,
            has_mass: raw.has_mass,
            volume: raw.volume.as_ref().and_then(Measured::value).unwrap_or(0.0),
            centroid,
            inertia,
        })
    }

    /// Center of mass as a point.
    pub fn com(&self) -> Point3 {
        Point3::from(self.centroid)
    }

    /// Inertia tensor as a matrix.
    pub fn inertia_matrix(&self) -> Mat3 {
        Mat3::from_row_slice(&self.inertia)
    }
}

/// One metadata property of a part or element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperty {
    /// Property name.
    pub name: String,
    /// Raw value.
    #[serde(default)]
    pub value: Value,
}

impl MetadataProperty {
    /// Parse a metadata response.
    ///
    /// Accepts a bare list, an object with a `properties` list, or an object
    /// with an `items` list whose first entry carries `properties`.
    pub fn list_from_response(response: &Value) -> Result<Vec<Self>, serde_json::Error> {
        let list = if response.is_array() {
            response
        } else if let Some(props) = response.get("properties") {
            props
        } else if let Some(props) = response
            .get("items")
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("properties"))
        {
            props
        } else {
            return Err(serde_json::Error::custom("metadata response has no properties"));
        };
        serde_json::from_value(list.clone())
    }

    /// Interpret the value as a boolean flag.
    pub fn as_flag(&self) -> Option<bool> {
        match &self.value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" | "" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        }
    }
}

/// Value of the boolean property `name`; `false` when absent or not a flag.
pub fn metadata_flag(properties: &[MetadataProperty], name: &str) -> bool {
    properties
        .iter()
        .find(|p| p.name == name)
        .and_then(MetadataProperty::as_flag)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_parse_two_part_assembly() {
        let json = r#"{
            "rootAssembly": {
                "documentId": "d1", "elementId": "root", "documentMicroversion": "mv",
                "instances": [
                    {"id": "A", "name": "Part 1 <1>", "type": "Part", "documentId": "d1",
                     "elementId": "ps", "partId": "JHD", "documentMicroversion": "mv",
                     "configuration": "default", "suppressed": false, "isStandardContent": false}
                ],
                "occurrences": [
                    {"path": ["A"], "hidden": false, "fixed": false,
                     "transform": [1,0,0,0.5, 0,1,0,0, 0,0,1,0, 0,0,0,1]}
                ],
                "features": [],
                "patterns": []
            },
            "subAssemblies": [],
            "parts": []
        }"#;
        let def = AssemblyDefinition::from_json(json).unwrap();
        let inst = &def.root_assembly.instances[0];
        assert!(inst.is_part());
        let id = inst.definition_id(&VersionSelector::Workspace("w".into()));
        assert_eq!(id.version, VersionSelector::Microversion("mv".into()));
        assert_eq!(id.part_id.as_deref(), Some("JHD"));

        let occ = &def.root_assembly.occurrences[0];
        let t = occ.world_transform().unwrap();
        assert_relative_eq!(t.translation_part().x, 0.5);
    }

    #[test]
    fn test_version_preferred_over_microversion() {
        let inst: Instance = serde_json::from_value(json!({
            "id": "A", "name": "Sub <1>", "type": "Assembly", "documentId": "d",
            "elementId": "e", "documentVersion": "v7", "documentMicroversion": "mv",
            "partId": "ignored"
        }))
        .unwrap();
        let id = inst.definition_id(&VersionSelector::Workspace("w".into()));
        assert_eq!(id.version, VersionSelector::Version("v7".into()));
        assert_eq!(id.part_id, None);
    }

    #[test]
    fn test_mate_feature_parse() {
        let feature: Feature = serde_json::from_value(json!({
            "id": "f1", "featureType": "mate", "suppressed": false,
            "featureData": {
                "name": "Revolute 1", "mateType": "REVOLUTE",
                "matedEntities": [
                    {"matedOccurrence": ["W"], "matedCS": {
                        "xAxis": [1,0,0], "yAxis": [0,1,0], "zAxis": [0,0,1], "origin": [0,0,0]}},
                    {"matedOccurrence": ["B"], "matedCS": {
                        "xAxis": [1,0,0], "yAxis": [0,1,0], "zAxis": [0,0,1], "origin": [0.1,0,0]}}
                ]
            }
        }))
        .unwrap();
        assert!(feature.is_mate());
        assert_eq!(feature.feature_data.mate_type, Some(MateType::Revolute));
        let frame = feature.feature_data.mated_entities[1].mated_cs.to_transform();
        assert_relative_eq!(frame.translation_part().x, 0.1);
    }

    #[test]
    fn test_unknown_mate_type() {
        let data: FeatureData = serde_json::from_value(json!({
            "name": "odd", "mateType": "SCREW_LIKE", "matedEntities": []
        }))
        .unwrap();
        assert_eq!(data.mate_type, Some(MateType::Unknown));

        let data: FeatureData =
            serde_json::from_value(json!({"name": "slot", "mateType": "PIN_SLOT"})).unwrap();
        assert_eq!(data.mate_type, Some(MateType::PinSlot));
    }

    #[test]
    fn test_mass_from_part_response() {
        let response = json!({
            "bodies": {
                "JHD": {
                    "mass": [2.0, 1.9, 2.1],
                    "hasMass": true,
                    "volume": [0.001, 0.001, 0.001],
                    "centroid": [0.1, 0.2, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                    "inertia": [1,0,0, 0,2,0, 0,0,3, 0,0,0, 0,0,0, 0,0,0]
                }
            }
        });
        let mp = MassProperties::from_response(&response, Some("JHD")).unwrap();
        assert_eq!(mp.mass, 2.0);
        assert_eq!(mp.centroid, [0.1, 0.2, 0.3]);
        assert_eq!(mp.inertia_matrix()[(2, 2)], 3.0);
        assert!(MassProperties::from_response(&response, Some("other")).is_err());
    }

    #[test]
    fn test_mass_from_flat_assembly_response() {
        let response = json!({
            "mass": [5.0], "hasMass": true, "volume": [0.01],
            "centroid": [0.0, 0.0, 1.0], "inertia": [1,0,0,0,1,0,0,0,1]
        });
        let mp = MassProperties::from_response(&response, None).unwrap();
        assert_eq!(mp.mass, 5.0);
        assert_relative_eq!(mp.com().z, 1.0);
    }

    #[test]
    fn test_mass_rejects_short_inertia() {
        let response = json!({"mass": 1.0, "centroid": [0,0,0], "inertia": [1,0,0]});
        assert!(MassProperties::from_response(&response, None).is_err());
    }

    #[test]
    fn test_metadata_flag() {
        let response = json!({"properties": [
            {"name": "Name", "value": "Wheel"},
            {"name": "Rigid Body", "value": true}
        ]});
        let props = MetadataProperty::list_from_response(&response).unwrap();
        assert!(metadata_flag(&props, "Rigid Body"));
        assert!(!metadata_flag(&props, "Missing"));

        let nested = json!({"items": [{"properties": [{"name": "Rigid Body", "value": "false"}]}]});
        let props = MetadataProperty::list_from_response(&nested).unwrap();
        assert!(!metadata_flag(&props, "Rigid Body"));
    }
}
