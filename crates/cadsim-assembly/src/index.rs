//! Lookup structures built from the raw assembly definition.
//!
//! Subassemblies are indexed by element id (one definition, many
//! instantiations), occurrences by their global path, and mates by the
//! global path of their parent side. Mates defined inside a subassembly are
//! fanned out once per instantiation of that subassembly.

use std::collections::{BTreeMap, HashMap};

use cadsim_ir::{
    AssemblyDefinition, Feature, Instance, InstanceKind, MateType, OccurrencePath, RootAssembly,
    SubAssembly,
};
use cadsim_math::Transform;
use tracing::debug;

use crate::AssemblyError;

/// Decimals kept in mate frames; suppresses float noise from the service.
pub const MATE_FRAME_DECIMALS: i32 = 10;

/// Placement of one occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceInfo {
    /// World transform.
    pub transform: Transform,
    /// Hidden in the CAD view.
    pub hidden: bool,
}

/// A mate resolved to global occurrence paths.
#[derive(Debug, Clone, PartialEq)]
pub struct MateRecord {
    /// Mate name.
    pub name: String,
    /// Mate type.
    pub mate_type: MateType,
    /// Global path of the parent side; the root path means the world.
    pub parent_path: OccurrencePath,
    /// Global path of the child side.
    pub child_path: OccurrencePath,
    /// Mate connector frame in world coordinates.
    pub frame_world: Transform,
    /// Occurrence path of the assembly instantiation that owns the mate.
    pub owner: OccurrencePath,
}

impl MateRecord {
    /// Whether the parent side is the assembly origin.
    pub fn is_world_parent(&self) -> bool {
        self.parent_path.is_root()
    }
}

/// Resolved mates keyed by parent occurrence path.
#[derive(Debug, Clone, Default)]
pub struct MateIndex {
    by_parent: BTreeMap<OccurrencePath, Vec<MateRecord>>,
}

impl MateIndex {
    /// Mates whose parent side is `path`.
    pub fn for_path(&self, path: &OccurrencePath) -> &[MateRecord] {
        self.by_parent.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every resolved mate, ordered by parent path.
    pub fn iter(&self) -> impl Iterator<Item = &MateRecord> {
        self.by_parent.values().flatten()
    }

    /// Total number of resolved mates.
    pub fn len(&self) -> usize {
        self.by_parent.values().map(Vec::len).sum()
    }

    /// Whether no mate resolved.
    pub fn is_empty(&self) -> bool {
        self.by_parent.is_empty()
    }

    fn insert(&mut self, record: MateRecord) {
        self.by_parent.entry(record.parent_path.clone()).or_default().push(record);
    }
}

/// Map element id to subassembly definition.
pub fn index_subassemblies_by_element_id(
    definition: &AssemblyDefinition,
) -> HashMap<&str, &SubAssembly> {
    definition
        .sub_assemblies
        .iter()
        .map(|sub| (sub.element_id.as_str(), sub))
        .collect()
}

/// Map global occurrence path to placement.
pub fn index_occurrences_by_path(
    root: &RootAssembly,
) -> Result<HashMap<OccurrencePath, OccurrenceInfo>, AssemblyError> {
    let mut index = HashMap::with_capacity(root.occurrences.len());
    for occurrence in &root.occurrences {
        let path = occurrence.occurrence_path();
        let transform = occurrence
            .world_transform()
            .ok_or_else(|| AssemblyError::MalformedTransform {
                path: path.clone(),
                len: occurrence.transform.len(),
            })?;
        index.insert(
            path,
            OccurrenceInfo {
                transform,
                hidden: occurrence.hidden,
            },
        );
    }
    Ok(index)
}

/// Find every occurrence path at which each subassembly is instantiated.
///
/// Walks the instance lists down from the root, so top-level subassemblies
/// are found whether or not they carry an occurrence record. Suppressed
/// instances and everything beneath them are skipped.
pub fn index_instantiations<'a>(
    root: &'a RootAssembly,
    subassemblies: &HashMap<&str, &'a SubAssembly>,
) -> HashMap<&'a str, Vec<OccurrencePath>> {
    let mut found: HashMap<&str, Vec<OccurrencePath>> = HashMap::new();
    let mut stack: Vec<(OccurrencePath, &'a [Instance])> =
        vec![(OccurrencePath::root(), root.instances.as_slice())];
    while let Some((prefix, instances)) = stack.pop() {
        for instance in instances {
            if instance.suppressed || instance.kind != InstanceKind::Assembly {
                continue;
            }
            let path = prefix.child(&instance.id);
            if let Some(sub) = subassemblies.get(instance.element_id.as_str()).copied() {
                stack.push((path.clone(), sub.instances.as_slice()));
            }
            found.entry(instance.element_id.as_str()).or_default().push(path);
        }
    }
    for paths in found.values_mut() {
        paths.sort();
    }
    found
}

/// Resolve every mate to global occurrence paths.
///
/// Root mates resolve once. Mates of a subassembly resolve once per
/// instantiation, with their relative paths prefixed by the instantiation
/// path, so a subassembly with `K` mates instantiated `N` times yields
/// `K * N` records.
pub fn index_mates_by_occurrence_path(
    definition: &AssemblyDefinition,
    subassemblies: &HashMap<&str, &SubAssembly>,
    occurrences: &HashMap<OccurrencePath, OccurrenceInfo>,
) -> Result<MateIndex, AssemblyError> {
    let mut index = MateIndex::default();
    let root = &definition.root_assembly;

    for feature in root.features.iter().filter(|f| f.is_mate()) {
        index.insert(resolve_mate(feature, &OccurrencePath::root(), root, occurrences)?);
    }

    let instantiations = index_instantiations(root, subassemblies);
    for sub in &definition.sub_assemblies {
        let mates: Vec<&Feature> = sub.features.iter().filter(|f| f.is_mate()).collect();
        if mates.is_empty() {
            continue;
        }
        let prefixes = instantiations
            .get(sub.element_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        debug!(
            element_id = %sub.element_id,
            mates = mates.len(),
            instantiations = prefixes.len(),
            "fanning out subassembly mates"
        );
        for prefix in prefixes {
            for feature in &mates {
                index.insert(resolve_mate(feature, prefix, root, occurrences)?);
            }
        }
    }
    Ok(index)
}

/// Resolve one mate feature defined in the assembly instantiated at `owner`.
///
/// Of the two mated entities, the one with an empty path (the assembly
/// origin) is the parent; otherwise the second entity is the parent.
fn resolve_mate(
    feature: &Feature,
    owner: &OccurrencePath,
    root: &RootAssembly,
    occurrences: &HashMap<OccurrencePath, OccurrenceInfo>,
) -> Result<MateRecord, AssemblyError> {
    let data = &feature.feature_data;
    let malformed = |reason: &str| AssemblyError::MalformedMate {
        mate: data.name.clone(),
        reason: reason.to_string(),
    };

    let [first, second] = data.mated_entities.as_slice() else {
        return Err(malformed(&format!(
            "expected 2 mated entities, found {}",
            data.mated_entities.len()
        )));
    };
    let (parent, child) = if first.mated_occurrence.is_empty() {
        (first, second)
    } else {
        (second, first)
    };
    if child.mated_occurrence.is_empty() {
        return Err(malformed("both sides reference the assembly origin"));
    }

    let parent_path = owner.join(&OccurrencePath::new(parent.mated_occurrence.clone()));
    let child_path = owner.join(&OccurrencePath::new(child.mated_occurrence.clone()));

    let parent_tform = placement(&parent_path, root, occurrences)?;
    placement(&child_path, root, occurrences)?;

    let frame_world = parent_tform
        .then(&parent.mated_cs.to_transform())
        .rounded(MATE_FRAME_DECIMALS);

    Ok(MateRecord {
        name: data.name.clone(),
        mate_type: data.mate_type.unwrap_or(MateType::Unknown),
        parent_path,
        child_path,
        frame_world,
        owner: owner.clone(),
    })
}

/// World transform at `path`.
///
/// The root and top-level instances without an occurrence record sit at the
/// identity.
fn placement(
    path: &OccurrencePath,
    root: &RootAssembly,
    occurrences: &HashMap<OccurrencePath, OccurrenceInfo>,
) -> Result<Transform, AssemblyError> {
    if path.is_root() {
        return Ok(Transform::identity());
    }
    if let Some(info) = occurrences.get(path) {
        return Ok(info.transform.clone());
    }
    match path.ids() {
        [id] if root.instances.iter().any(|i| &i.id == id) => Ok(Transform::identity()),
        _ => Err(AssemblyError::MissingOccurrence { path: path.clone() }),
    }
}

/// All indices needed to build the tree.
#[derive(Debug)]
pub struct DocumentIndex<'a> {
    /// Subassemblies by element id.
    pub subassemblies: HashMap<&'a str, &'a SubAssembly>,
    /// Occurrences by global path.
    pub occurrences: HashMap<OccurrencePath, OccurrenceInfo>,
    /// Mates by global parent path.
    pub mates: MateIndex,
}

impl<'a> DocumentIndex<'a> {
    /// Build every index for `definition`.
    pub fn build(definition: &'a AssemblyDefinition) -> Result<Self, AssemblyError> {
        let subassemblies = index_subassemblies_by_element_id(definition);
        let occurrences = index_occurrences_by_path(&definition.root_assembly)?;
        let mates = index_mates_by_occurrence_path(definition, &subassemblies, &occurrences)?;
        debug!(
            subassemblies = subassemblies.len(),
            occurrences = occurrences.len(),
            mates = mates.len(),
            "document indexed"
        );
        Ok(Self {
            subassemblies,
            occurrences,
            mates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn identity_at(x: f64) -> serde_json::Value {
        json!([1, 0, 0, x, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1])
    }

    fn mate(name: &str, child: &[&str], parent: &[&str], origin_x: f64) -> serde_json::Value {
        json!({
            "id": name, "featureType": "mate", "suppressed": false,
            "featureData": {
                "name": name, "mateType": "REVOLUTE",
                "matedEntities": [
                    {"matedOccurrence": child, "matedCS": {
                        "xAxis": [1,0,0], "yAxis": [0,1,0], "zAxis": [0,0,1], "origin": [0,0,0]}},
                    {"matedOccurrence": parent, "matedCS": {
                        "xAxis": [1,0,0], "yAxis": [0,1,0], "zAxis": [0,0,1], "origin": [origin_x,0,0]}}
                ]
            }
        })
    }

    fn part(id: &str, name: &str) -> serde_json::Value {
        json!({"id": id, "name": name, "type": "Part", "documentId": "d",
               "elementId": "ps", "partId": id, "documentMicroversion": "m"})
    }

    /// Root holds two instances (S1, S2) of subassembly "sub", which holds
    /// parts A and B joined by one mate.
    fn repeated_subassembly() -> AssemblyDefinition {
        serde_json::from_value(json!({
            "rootAssembly": {
                "documentId": "d", "elementId": "root",
                "instances": [
                    {"id": "S1", "name": "Arm <1>", "type": "Assembly", "documentId": "d",
                     "elementId": "sub", "documentMicroversion": "m"},
                    {"id": "S2", "name": "Arm <2>", "type": "Assembly", "documentId": "d",
                     "elementId": "sub", "documentMicroversion": "m"}
                ],
                "features": [],
                "occurrences": [
                    {"path": ["S1"], "transform": identity_at(0.0)},
                    {"path": ["S1", "A"], "transform": identity_at(0.0)},
                    {"path": ["S1", "B"], "transform": identity_at(0.1)},
                    {"path": ["S2"], "transform": identity_at(1.0)},
                    {"path": ["S2", "A"], "transform": identity_at(1.0)},
                    {"path": ["S2", "B"], "transform": identity_at(1.1)}
                ]
            },
            "subAssemblies": [{
                "documentId": "d", "elementId": "sub",
                "instances": [part("A", "Link <1>"), part("B", "Link <2>")],
                "features": [mate("Hinge", &["B"], &["A"], 0.05)]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_subassemblies_and_occurrences() {
        let def = repeated_subassembly();
        let index = DocumentIndex::build(&def).unwrap();
        assert_eq!(index.subassemblies.len(), 1);
        assert_eq!(index.occurrences.len(), 6);
        let info = &index.occurrences[&OccurrencePath::from(&["S2", "B"][..])];
        assert_relative_eq!(info.transform.translation_part().x, 1.1);
    }

    #[test]
    fn test_mate_fan_out_per_instantiation() {
        let def = repeated_subassembly();
        let index = DocumentIndex::build(&def).unwrap();
        assert_eq!(index.mates.len(), 2);

        let first = &index.mates.for_path(&OccurrencePath::from(&["S1", "A"][..]))[0];
        let second = &index.mates.for_path(&OccurrencePath::from(&["S2", "A"][..]))[0];
        assert_eq!(first.child_path, OccurrencePath::from(&["S1", "B"][..]));
        assert_eq!(second.child_path, OccurrencePath::from(&["S2", "B"][..]));
        assert_eq!(first.owner, OccurrencePath::from(&["S1"][..]));

        // Frames follow the parent occurrence of each copy.
        assert_relative_eq!(first.frame_world.translation_part().x, 0.05);
        assert_relative_eq!(second.frame_world.translation_part().x, 1.05);
    }

    #[test]
    fn test_world_side_is_parent() {
        let mut def = repeated_subassembly();
        def.root_assembly.features =
            vec![serde_json::from_value(mate("Ground", &[], &["S1", "A"], 0.0)).unwrap()];
        let index = DocumentIndex::build(&def).unwrap();
        let grounded = &index.mates.for_path(&OccurrencePath::root())[0];
        assert!(grounded.is_world_parent());
        assert_eq!(grounded.child_path, OccurrencePath::from(&["S1", "A"][..]));
    }

    #[test]
    fn test_missing_occurrence_is_fatal() {
        let mut def = repeated_subassembly();
        def.root_assembly.occurrences.retain(|o| o.path != ["S2", "B"]);
        let err = DocumentIndex::build(&def).unwrap_err();
        match err {
            AssemblyError::MissingOccurrence { path } => assert_eq!(path.to_string(), "S2/B"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_single_entity_mate_is_malformed() {
        let mut def = repeated_subassembly();
        let mut bad: Feature = serde_json::from_value(mate("Broken", &["S1", "A"], &[], 0.0)).unwrap();
        bad.feature_data.mated_entities.truncate(1);
        def.root_assembly.features = vec![bad];
        assert!(matches!(
            DocumentIndex::build(&def),
            Err(AssemblyError::MalformedMate { .. })
        ));
    }

    #[test]
    fn test_top_level_parts_without_occurrences_sit_at_identity() {
        let def: AssemblyDefinition = serde_json::from_value(json!({
            "rootAssembly": {
                "documentId": "d", "elementId": "root",
                "instances": [part("B", "Base <1>"), part("W", "Wheel <1>")],
                "features": [mate("Axle", &["W"], &["B"], 0.2)],
                "occurrences": []
            },
            "subAssemblies": []
        }))
        .unwrap();
        let index = DocumentIndex::build(&def).unwrap();
        let axle = &index.mates.for_path(&OccurrencePath::from(&["B"][..]))[0];
        assert_eq!(axle.child_path, OccurrencePath::from(&["W"][..]));
        assert_relative_eq!(axle.frame_world.translation_part().x, 0.2);
    }

    #[test]
    fn test_unknown_top_level_id_is_still_missing() {
        let mut def = repeated_subassembly();
        def.root_assembly.features =
            vec![serde_json::from_value(mate("Ghost", &["X"], &["S1", "A"], 0.0)).unwrap()];
        assert!(matches!(
            DocumentIndex::build(&def),
            Err(AssemblyError::MissingOccurrence { .. })
        ));
    }

    #[test]
    fn test_top_level_subassembly_without_occurrence_fans_out() {
        let mut def = repeated_subassembly();
        def.root_assembly.occurrences.retain(|o| o.path.len() > 1);
        let index = DocumentIndex::build(&def).unwrap();
        assert_eq!(index.mates.len(), 2);
        assert_eq!(
            index.mates.for_path(&OccurrencePath::from(&["S2", "A"][..]))[0].child_path,
            OccurrencePath::from(&["S2", "B"][..])
        );
    }

    #[test]
    fn test_suppressed_subassembly_is_not_instantiated() {
        let mut def = repeated_subassembly();
        def.root_assembly.instances[1].suppressed = true;
        let subs = index_subassemblies_by_element_id(&def);
        let found = index_instantiations(&def.root_assembly, &subs);
        assert_eq!(found["sub"], vec![OccurrencePath::from(&["S1"][..])]);
    }

    #[test]
    fn test_instantiations_ignore_colliding_part_ids() {
        let def = repeated_subassembly();
        let subs = index_subassemblies_by_element_id(&def);
        let found = index_instantiations(&def.root_assembly, &subs);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found["sub"],
            vec![OccurrencePath::from(&["S1"][..]), OccurrencePath::from(&["S2"][..])]
        );
    }
}
