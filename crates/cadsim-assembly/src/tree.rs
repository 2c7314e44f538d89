//! Assembly tree reconstruction.
//!
//! The flat, path-addressed assembly definition is expanded into a tree with
//! one node per occurrence. An explicit stack drives a depth-first walk: each
//! popped subassembly enumerates its instances, allocating a child node per
//! instance and pushing the subassembly children. Every node records its
//! world transform (verbatim from the occurrence list), its rigid-body flag
//! and, for rigid bodies, world-frame mass properties.
//!
//! While nodes are initialized, mates whose parent path equals the node's
//! path are attached to the nearest rigid-body ancestor. Child endpoints are
//! resolved once the tree is complete.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use cadsim_ir::{
    metadata_flag, AssemblyDefinition, DefinitionId, Instance, MassProperties, MetadataProperty,
    OccurrencePath, VersionSelector,
};
use cadsim_math::{reexpress_mass_in_world_frame, Point3, Transform, WorldMass};
use tracing::{debug, info};

use crate::index::{DocumentIndex, MateRecord};
use crate::{AssemblyError, BuildOptions, Diagnostic, Fetcher, RunReport};

/// Index of a node in an [`AssemblyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Construction state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Allocated, nothing resolved.
    Pending,
    /// Occurrence, transform and rigid-body flag resolved.
    Initialized,
    /// Children enumerated (subassemblies only).
    Expanded,
    /// World-frame mass computed (rigid bodies only).
    Finalized,
}

/// One occurrence in the flattened tree.
#[derive(Debug, Clone)]
pub struct AssemblyNode {
    /// This node's index.
    pub id: NodeId,
    /// Enclosing assembly; `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in instance order.
    pub children: Vec<NodeId>,
    /// Construction state.
    pub state: NodeState,
    /// Global occurrence path; unique across the tree.
    pub path: OccurrencePath,
    /// What this occurrence instances; `None` for the root.
    pub definition: Option<DefinitionId>,
    /// Element id of the definition, used to find subassembly contents.
    pub element_id: String,
    /// Whether the instance is a part. Parts are always leaves.
    pub is_part: bool,
    /// Instance name followed by a run-scoped counter.
    pub display_name: String,
    /// Sanitized, unique identifier used for link names.
    pub simplified_name: String,
    /// Base name for the body's mesh file.
    pub mesh_name: String,
    /// Transform relative to the assembly root.
    pub world_transform: Transform,
    /// Hidden in the CAD view.
    pub hidden: bool,
    /// Marked as one indivisible simulation link.
    pub is_rigid: bool,
    /// Recognized metadata properties.
    pub metadata: Vec<MetadataProperty>,
    /// Mass properties in the element frame (rigid bodies only).
    pub local_mass: Option<MassProperties>,
    /// Mass properties in the world frame (rigid bodies only).
    pub mass: Option<WorldMass>,
}

impl AssemblyNode {
    /// Whether this is the synthetic root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Nearest enclosing rigid body for every occurrence path in the tree.
#[derive(Debug, Clone, Default)]
pub struct RigidBodyIndex {
    nearest: HashMap<OccurrencePath, NodeId>,
}

impl RigidBodyIndex {
    /// Nearest rigid body enclosing `path` (the node itself if rigid).
    ///
    /// Paths not in the tree fall back to their longest known prefix.
    pub fn nearest(&self, path: &OccurrencePath) -> Option<NodeId> {
        let mut current = Some(path.clone());
        while let Some(p) = current {
            if let Some(id) = self.nearest.get(&p) {
                return Some(*id);
            }
            current = p.parent();
        }
        None
    }

    fn record(&mut self, path: OccurrencePath, body: NodeId) {
        self.nearest.insert(path, body);
    }
}

/// A mate whose endpoints were attributed to rigid bodies.
#[derive(Debug, Clone)]
pub struct ResolvedMate {
    /// The resolved mate.
    pub record: MateRecord,
    /// Parent body; `None` when the mate attaches to the world.
    pub parent_body: Option<NodeId>,
    /// Child body.
    pub child_body: NodeId,
}

/// The reconstructed assembly.
#[derive(Debug, Clone)]
pub struct AssemblyTree {
    name: String,
    nodes: Vec<AssemblyNode>,
    by_path: HashMap<OccurrencePath, NodeId>,
    rigid_index: RigidBodyIndex,
    mates: Vec<ResolvedMate>,
}

impl AssemblyTree {
    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root node.
    pub fn root(&self) -> &AssemblyNode {
        &self.nodes[0]
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &AssemblyNode {
        &self.nodes[id.0]
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[AssemblyNode] {
        &self.nodes
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Node at `path`.
    pub fn find(&self, path: &OccurrencePath) -> Option<&AssemblyNode> {
        self.by_path.get(path).map(|id| self.node(*id))
    }

    /// Rigid-body nodes in tree order.
    pub fn rigid_bodies(&self) -> impl Iterator<Item = &AssemblyNode> {
        self.nodes.iter().filter(|n| n.is_rigid)
    }

    /// Nearest rigid body enclosing `path`.
    pub fn nearest_rigid_body(&self, path: &OccurrencePath) -> Option<&AssemblyNode> {
        self.rigid_index.nearest(path).map(|id| self.node(id))
    }

    /// Mates attributed to rigid bodies.
    pub fn mates(&self) -> &[ResolvedMate] {
        &self.mates
    }

    /// Indented dump of the tree: name, path, flags and mass.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(NodeId(0), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            let _ = write!(out, "{:indent$}{}", "", node.display_name, indent = depth * 2);
            if !node.is_root() {
                let _ = write!(out, " [{}]", node.path);
            }
            if node.is_rigid {
                let mass = node.mass.as_ref().map_or(0.0, |m| m.mass);
                let _ = write!(out, " rigid mass={mass}");
            }
            if node.hidden {
                out.push_str(" hidden");
            }
            out.push('\n');
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}

/// Lower-case, strip `<` and `>`, and replace spaces with `_`.
pub fn simplify_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '<' && *c != '>')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Mesh base name: the display name without its trailing `<k>` and counter
/// tokens, joined and lower-cased. Falls back to `fallback` when nothing is left.
pub fn mesh_name(display_name: &str, fallback: &str) -> String {
    let tokens: Vec<&str> = display_name.split(' ').collect();
    let kept = tokens.len().saturating_sub(2);
    let base = simplify_name(&tokens[..kept].concat());
    if base.is_empty() {
        fallback.to_string()
    } else {
        base
    }
}

/// Run-scoped display-name counter.
#[derive(Debug, Default)]
struct NameRegistry {
    counters: HashMap<String, usize>,
    used: HashSet<String>,
}

impl NameRegistry {
    /// Reserve a name that is not a counter-suffixed display name.
    fn reserve(&mut self, simplified: &str) {
        self.used.insert(simplified.to_string());
    }

    /// Next `(display, simplified)` pair for an instance named `raw`.
    fn assign(&mut self, raw: &str) -> (String, String) {
        loop {
            let n = *self
                .counters
                .entry(raw.to_string())
                .and_modify(|n| *n += 1)
                .or_insert(0);
            let display = format!("{raw} {n}");
            let simplified = simplify_name(&display);
            if self.used.insert(simplified.clone()) {
                return (display, simplified);
            }
        }
    }
}

/// A mate attached to its parent body, awaiting child resolution.
struct PendingMate {
    record: MateRecord,
    parent_body: Option<NodeId>,
}

/// Builds an [`AssemblyTree`] from an assembly definition.
pub struct TreeBuilder<'a, 'c> {
    definition: &'a AssemblyDefinition,
    index: DocumentIndex<'a>,
    fetcher: &'a Fetcher<'c>,
    options: &'a BuildOptions,
    fallback_version: VersionSelector,
    nodes: Vec<AssemblyNode>,
    by_path: HashMap<OccurrencePath, NodeId>,
    rigid_index: RigidBodyIndex,
    names: NameRegistry,
    pending_mates: Vec<PendingMate>,
    report: RunReport,
}

impl<'a, 'c> TreeBuilder<'a, 'c> {
    /// Index `definition` and prepare a builder.
    ///
    /// `fallback_version` addresses instances that carry neither a version
    /// nor a microversion (typically the workspace of the run).
    pub fn new(
        definition: &'a AssemblyDefinition,
        fetcher: &'a Fetcher<'c>,
        options: &'a BuildOptions,
        fallback_version: VersionSelector,
    ) -> Result<Self, AssemblyError> {
        Ok(Self {
            definition,
            index: DocumentIndex::build(definition)?,
            fetcher,
            options,
            fallback_version,
            nodes: Vec::new(),
            by_path: HashMap::new(),
            rigid_index: RigidBodyIndex::default(),
            names: NameRegistry::default(),
            pending_mates: Vec::new(),
            report: RunReport::new(),
        })
    }

    /// Number of resolved mate records in the document index.
    pub fn indexed_mates(&self) -> usize {
        self.index.mates.len()
    }

    /// Build the tree, returning it with the run's diagnostics.
    pub fn build(mut self, name: &str) -> Result<(AssemblyTree, RunReport), AssemblyError> {
        self.prefetch()?;

        let root = self.allocate_root(name);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let instances = self.instances_of(id)?;
            for instance in instances {
                if instance.suppressed {
                    debug!(instance = %instance.id, "skipping suppressed instance");
                    continue;
                }
                let child = self.allocate_child(id, instance)?;
                if !self.nodes[child.0].is_part {
                    stack.push(child);
                }
            }
            let node = &mut self.nodes[id.0];
            node.state = NodeState::Expanded;
            if node.is_rigid {
                self.finalize(id);
            }
        }

        self.report_detached_mates();
        let mates = self.resolve_mates();
        let mut report = self.fetcher.take_report();
        report.merge(self.report);
        info!(
            nodes = self.nodes.len(),
            rigid_bodies = self.nodes.iter().filter(|n| n.is_rigid).count(),
            mates = mates.len(),
            "assembly tree built"
        );
        let tree = AssemblyTree {
            name: name.to_string(),
            nodes: self.nodes,
            by_path: self.by_path,
            rigid_index: self.rigid_index,
            mates,
        };
        Ok((tree, report))
    }

    /// Fetch metadata for every definition, then mass for the rigid ones.
    fn prefetch(&self) -> Result<(), AssemblyError> {
        let ids: Vec<DefinitionId> = self
            .all_instances()
            .map(|i| i.definition_id(&self.fallback_version))
            .collect();
        self.fetcher.prefetch_metadata(&ids)?;

        let mut rigid = Vec::new();
        for id in ids {
            if let Some(props) = self.fetcher.metadata(&id)? {
                if metadata_flag(&props, &self.options.rigid_body_property) {
                    rigid.push(id);
                }
            }
        }
        self.fetcher.prefetch_mass(&rigid)
    }

    fn all_instances(&self) -> impl Iterator<Item = &'a Instance> {
        let definition: &'a AssemblyDefinition = self.definition;
        definition
            .root_assembly
            .instances
            .iter()
            .chain(definition.sub_assemblies.iter().flat_map(|s| s.instances.iter()))
            .filter(|i| !i.suppressed)
    }

    fn allocate_root(&mut self, name: &str) -> NodeId {
        let root = &self.definition.root_assembly;
        let simplified = simplify_name(name);
        self.names.reserve(&simplified);
        let id = NodeId(0);
        self.nodes.push(AssemblyNode {
            id,
            parent: None,
            children: Vec::new(),
            state: NodeState::Initialized,
            path: OccurrencePath::root(),
            definition: None,
            element_id: root.element_id.clone(),
            is_part: false,
            display_name: name.to_string(),
            mesh_name: simplified.clone(),
            simplified_name: simplified,
            world_transform: Transform::identity(),
            hidden: false,
            is_rigid: false,
            metadata: Vec::new(),
            local_mass: None,
            mass: None,
        });
        self.by_path.insert(OccurrencePath::root(), id);
        self.attach_mates(id);
        id
    }

    /// Instances of the assembly at node `id`.
    fn instances_of(&self, id: NodeId) -> Result<&'a [Instance], AssemblyError> {
        let definition: &'a AssemblyDefinition = self.definition;
        let node = &self.nodes[id.0];
        if node.is_root() {
            return Ok(&definition.root_assembly.instances);
        }
        let sub: &'a _ = self
            .index
            .subassemblies
            .get(node.element_id.as_str())
            .copied()
            .ok_or_else(|| AssemblyError::MissingSubassembly {
                element_id: node.element_id.clone(),
            })?;
        Ok(&sub.instances)
    }

    fn allocate_child(&mut self, parent: NodeId, instance: &Instance) -> Result<NodeId, AssemblyError> {
        let parent_node = &self.nodes[parent.0];
        let path = parent_node.path.child(&instance.id);
        let top_level = parent_node.is_root();
        let definition = instance.definition_id(&self.fallback_version);

        if !instance.is_part() && !self.index.subassemblies.contains_key(instance.element_id.as_str()) {
            return Err(AssemblyError::MissingSubassembly {
                element_id: instance.element_id.clone(),
            });
        }

        let (world_transform, hidden) = match self.index.occurrences.get(&path) {
            Some(info) => (info.transform.clone(), info.hidden),
            None if top_level => (Transform::identity(), false),
            None => return Err(AssemblyError::MissingOccurrence { path }),
        };

        let (display_name, simplified_name) = self.names.assign(&instance.name);
        let mesh_name = mesh_name(&display_name, &simplified_name);

        let metadata = self.fetcher.metadata(&definition)?.unwrap_or_default();
        let is_rigid = metadata_flag(&metadata, &self.options.rigid_body_property);
        let metadata: Vec<MetadataProperty> = metadata
            .into_iter()
            .filter(|p| self.options.is_recognized(&p.name))
            .collect();
        let local_mass = if is_rigid {
            self.fetcher.mass_properties(&definition)?
        } else {
            None
        };

        let id = NodeId(self.nodes.len());
        debug!(path = %path, name = %display_name, rigid = is_rigid, "node initialized");
        self.nodes.push(AssemblyNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            state: NodeState::Initialized,
            path: path.clone(),
            definition: Some(definition),
            element_id: instance.element_id.clone(),
            is_part: instance.is_part(),
            display_name,
            simplified_name,
            mesh_name,
            world_transform,
            hidden,
            is_rigid,
            metadata,
            local_mass,
            mass: None,
        });
        self.nodes[parent.0].children.push(id);
        self.by_path.insert(path.clone(), id);

        let parent_path = self.nodes[parent.0].path.clone();
        let nearest = if is_rigid {
            Some(id)
        } else {
            self.rigid_index.nearest(&parent_path)
        };
        if let Some(body) = nearest {
            self.rigid_index.record(path, body);
        }
        self.attach_mates(id);

        if is_rigid && instance.is_part() {
            self.finalize(id);
        }
        Ok(id)
    }

    /// Attach mates whose parent side is this node's path to its nearest rigid body.
    fn attach_mates(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        let records = self.index.mates.for_path(&node.path);
        if records.is_empty() {
            return;
        }
        let parent_body = if node.is_root() {
            None
        } else {
            match self.rigid_index.nearest(&node.path) {
                Some(body) => Some(body),
                None => {
                    for record in records {
                        self.report.push(Diagnostic::UnresolvedMate {
                            mate: record.name.clone(),
                            path: record.parent_path.clone(),
                        });
                    }
                    return;
                }
            }
        };
        for record in records {
            self.pending_mates.push(PendingMate {
                record: record.clone(),
                parent_body,
            });
        }
    }

    /// Report mates whose parent side never became a node, such as one
    /// beneath a suppressed instance.
    fn report_detached_mates(&mut self) {
        for record in self.index.mates.iter() {
            if !self.by_path.contains_key(&record.parent_path) {
                self.report.push(Diagnostic::UnresolvedMate {
                    mate: record.name.clone(),
                    path: record.parent_path.clone(),
                });
            }
        }
    }

    /// Compute world-frame mass for a rigid body.
    fn finalize(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        let local = match &node.local_mass {
            Some(local) if local.has_mass && local.mass > 0.0 => local,
            _ => {
                let diagnostic = Diagnostic::ZeroMass {
                    body: node.simplified_name.clone(),
                    path: node.path.clone(),
                };
                node.mass = Some(WorldMass::zero_at(node.world_transform.apply_point(
                    &node.local_mass.as_ref().map(MassProperties::com).unwrap_or_else(Point3::origin),
                )));
                node.state = NodeState::Finalized;
                self.report.push(diagnostic);
                return;
            }
        };
        node.mass = Some(reexpress_mass_in_world_frame(
            &node.world_transform,
            local.mass,
            &local.com(),
            &local.inertia_matrix(),
        ));
        node.state = NodeState::Finalized;
    }

    /// Resolve child endpoints of attached mates, dropping unusable ones.
    fn resolve_mates(&mut self) -> Vec<ResolvedMate> {
        let pending = std::mem::take(&mut self.pending_mates);
        let mut resolved = Vec::with_capacity(pending.len());
        for PendingMate { record, parent_body } in pending {
            let Some(child_body) = self.rigid_index.nearest(&record.child_path) else {
                self.report.push(Diagnostic::UnresolvedMate {
                    mate: record.name.clone(),
                    path: record.child_path.clone(),
                });
                continue;
            };
            if parent_body == Some(child_body) {
                self.report.push(Diagnostic::SelfMate {
                    mate: record.name.clone(),
                    body: self.nodes[child_body.0].simplified_name.clone(),
                });
                continue;
            }
            resolved.push(ResolvedMate {
                record,
                parent_body,
                child_body,
            });
        }
        resolved
    }
}

/// Build the tree for `definition` with default fallback addressing.
///
/// Instances without version or microversion fall back to the root's
/// microversion.
pub fn build_tree(
    definition: &AssemblyDefinition,
    fetcher: &Fetcher<'_>,
    options: &BuildOptions,
    name: &str,
) -> Result<(AssemblyTree, RunReport), AssemblyError> {
    let fallback = VersionSelector::Microversion(
        definition
            .root_assembly
            .document_microversion
            .clone()
            .unwrap_or_default(),
    );
    TreeBuilder::new(definition, fetcher, options, fallback)?.build(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_name() {
        assert_eq!(simplify_name("Wheel <2> 0"), "wheel_2_0");
        assert_eq!(simplify_name("Base Plate <1> 3"), "base_plate_1_3");
    }

    #[test]
    fn test_mesh_name_drops_instance_tokens() {
        assert_eq!(mesh_name("Part 1 <1> 0", "x"), "part1");
        assert_eq!(mesh_name("Wheel <2> 4", "x"), "wheel");
        assert_eq!(mesh_name("odd", "fallback"), "fallback");
    }

    #[test]
    fn test_name_counter_per_raw_name() {
        let mut names = NameRegistry::default();
        assert_eq!(names.assign("Wheel <1>").0, "Wheel <1> 0");
        assert_eq!(names.assign("Wheel <1>").0, "Wheel <1> 1");
        assert_eq!(names.assign("Body <1>").0, "Body <1> 0");
    }

    #[test]
    fn test_name_counter_skips_collisions() {
        let mut names = NameRegistry::default();
        names.reserve("b_0");
        let (display, simplified) = names.assign("B");
        assert_eq!(display, "B 1");
        assert_eq!(simplified, "b_1");
    }

    #[test]
    fn test_rigid_index_falls_back_to_prefix() {
        let mut index = RigidBodyIndex::default();
        let body = OccurrencePath::from(&["S", "P"][..]);
        index.record(body.clone(), NodeId(3));
        assert_eq!(index.nearest(&body.child("hidden")), Some(NodeId(3)));
        assert_eq!(index.nearest(&OccurrencePath::from(&["S"][..])), None);
    }
}
