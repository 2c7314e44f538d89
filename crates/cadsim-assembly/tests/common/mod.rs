//! Assembly payload fixtures.

#![allow(dead_code)]

use cadsim_ir::{AssemblyDefinition, DefinitionId, MassProperties, VersionSelector};
use serde_json::{json, Value};

pub const DOC: &str = "doc";
pub const MV: &str = "mv1";

/// Row-major transform translating by `(x, y, z)`.
pub fn translation(x: f64, y: f64, z: f64) -> Value {
    json!([1, 0, 0, x, 0, 1, 0, y, 0, 0, 1, z, 0, 0, 0, 1])
}

pub fn part(id: &str, name: &str, part_id: &str) -> Value {
    json!({
        "id": id, "name": name, "type": "Part", "documentId": DOC,
        "elementId": "studio", "partId": part_id, "documentMicroversion": MV,
        "configuration": "default", "suppressed": false
    })
}

pub fn assembly(id: &str, name: &str, element_id: &str) -> Value {
    json!({
        "id": id, "name": name, "type": "Assembly", "documentId": DOC,
        "elementId": element_id, "documentMicroversion": MV,
        "configuration": "default", "suppressed": false
    })
}

pub fn occurrence(path: &[&str], transform: Value) -> Value {
    json!({"path": path, "transform": transform, "hidden": false, "fixed": false})
}

/// A mate of `mate_type` with the child listed first, as the service does.
pub fn mate(name: &str, mate_type: &str, child: &[&str], parent: &[&str], origin: [f64; 3]) -> Value {
    json!({
        "id": name, "featureType": "mate", "suppressed": false,
        "featureData": {
            "name": name, "mateType": mate_type,
            "matedEntities": [
                {"matedOccurrence": child, "matedCS": {
                    "xAxis": [1, 0, 0], "yAxis": [0, 1, 0], "zAxis": [0, 0, 1], "origin": [0, 0, 0]}},
                {"matedOccurrence": parent, "matedCS": {
                    "xAxis": [1, 0, 0], "yAxis": [0, 1, 0], "zAxis": [0, 0, 1], "origin": origin}}
            ]
        }
    })
}

pub fn definition(
    instances: Vec<Value>,
    features: Vec<Value>,
    occurrences: Vec<Value>,
    sub_assemblies: Vec<Value>,
) -> AssemblyDefinition {
    serde_json::from_value(json!({
        "rootAssembly": {
            "documentId": DOC, "elementId": "root", "documentMicroversion": MV,
            "instances": instances, "features": features, "occurrences": occurrences
        },
        "subAssemblies": sub_assemblies
    }))
    .expect("fixture parses")
}

pub fn sub_assembly(element_id: &str, instances: Vec<Value>, features: Vec<Value>) -> Value {
    json!({
        "documentId": DOC, "elementId": element_id, "documentMicroversion": MV,
        "instances": instances, "features": features
    })
}

pub fn part_id(part_id: &str) -> DefinitionId {
    DefinitionId {
        document_id: DOC.into(),
        element_id: "studio".into(),
        version: VersionSelector::Microversion(MV.into()),
        part_id: Some(part_id.into()),
    }
}

pub fn assembly_id(element_id: &str) -> DefinitionId {
    DefinitionId {
        document_id: DOC.into(),
        element_id: element_id.into(),
        version: VersionSelector::Microversion(MV.into()),
        part_id: None,
    }
}

/// Unit-ish mass at `com` with a diagonal inertia.
pub fn mass(kg: f64, com: [f64; 3]) -> MassProperties {
    MassProperties {
        mass: kg,
        has_mass: true,
        volume: 0.001,
        centroid: com,
        inertia: [0.01, 0.0, 0.0, 0.0, 0.02, 0.0, 0.0, 0.0, 0.03],
    }
}
