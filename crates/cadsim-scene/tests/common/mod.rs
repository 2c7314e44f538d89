//! Assembly fixtures for emitter scenarios.

#![allow(dead_code)]

use cadsim_assembly::{build_tree, AssemblyTree, BuildOptions, CadClient, Fetcher, MemoryClient, RunReport};
use cadsim_ir::{AssemblyDefinition, DefinitionId, MassProperties, VersionSelector};
use serde_json::{json, Value};

pub const DOC: &str = "doc";
pub const MV: &str = "mv1";

pub fn translation(x: f64, y: f64, z: f64) -> Value {
    json!([1, 0, 0, x, 0, 1, 0, y, 0, 0, 1, z, 0, 0, 0, 1])
}

pub fn part(id: &str, name: &str, part_id: &str) -> Value {
    json!({
        "id": id, "name": name, "type": "Part", "documentId": DOC,
        "elementId": "studio", "partId": part_id, "documentMicroversion": MV,
        "suppressed": false
    })
}

pub fn assembly(id: &str, name: &str, element_id: &str) -> Value {
    json!({
        "id": id, "name": name, "type": "Assembly", "documentId": DOC,
        "elementId": element_id, "documentMicroversion": MV, "suppressed": false
    })
}

pub fn occurrence(path: &[&str], transform: Value) -> Value {
    json!({"path": path, "transform": transform, "hidden": false, "fixed": false})
}

/// A mate with the child listed first and an axis-aligned parent frame at `origin`.
pub fn mate(name: &str, mate_type: &str, child: &[&str], parent: &[&str], origin: [f64; 3]) -> Value {
    mate_with_axes(name, mate_type, child, parent, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], origin)
}

/// A mate whose parent frame has the given x, y and z axes.
pub fn mate_with_axes(
    name: &str,
    mate_type: &str,
    child: &[&str],
    parent: &[&str],
    axes: [[f64; 3]; 3],
    origin: [f64; 3],
) -> Value {
    json!({
        "id": name, "featureType": "mate", "suppressed": false,
        "featureData": {
            "name": name, "mateType": mate_type,
            "matedEntities": [
                {"matedOccurrence": child, "matedCS": {
                    "xAxis": [1, 0, 0], "yAxis": [0, 1, 0], "zAxis": [0, 0, 1], "origin": [0, 0, 0]}},
                {"matedOccurrence": parent, "matedCS": {
                    "xAxis": axes[0], "yAxis": axes[1], "zAxis": axes[2], "origin": origin}}
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

pub fn mass(kg: f64, com: [f64; 3]) -> MassProperties {
    MassProperties {
        mass: kg,
        has_mass: true,
        volume: 0.001,
        centroid: com,
        inertia: [0.01, 0.0, 0.0, 0.0, 0.02, 0.0, 0.0, 0.0, 0.03],
    }
}

/// Client where every listed part is a rigid body of `kg` at its origin.
pub fn rigid_parts(definition: AssemblyDefinition, parts: &[(&str, f64)]) -> MemoryClient {
    parts.iter().fold(MemoryClient::new(definition), |client, (pid, kg)| {
        client.with_rigid(part_id(pid)).with_mass(part_id(pid), mass(*kg, [0.0; 3]))
    })
}

pub fn tree_for(client: &MemoryClient) -> (AssemblyTree, RunReport) {
    let def = client
        .fetch_assembly_definition(DOC, "root", &VersionSelector::Microversion(MV.into()))
        .expect("definition");
    let options = BuildOptions::default();
    let fetcher = Fetcher::new(client, &options);
    build_tree(&def, &fetcher, &options, "robot").expect("tree builds")
}
