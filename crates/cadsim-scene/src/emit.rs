//! Link and joint emission from a finalized assembly tree.

use std::collections::HashSet;

use cadsim_assembly::{
    simplify_name, AssemblyNode, AssemblyTree, Diagnostic, MeshIndex, ResolvedMate, RunReport,
};
use cadsim_ir::{Inertial, InertiaTensor, Joint, Link, SceneGraph, Visual};
use cadsim_math::{Point3, Pose, Tolerance, WorldMass};
use tracing::{debug, info};

use crate::error::SceneError;
use crate::joints::plan_for;
use crate::EmitOptions;

/// Emit the scene graph for `tree`.
///
/// Every rigid-body node becomes a link named by its simplified name. Every
/// resolved mate becomes one joint, or a chain of joints through
/// intermediate links for planar and cylindrical mates. Visuals reference the
/// file recorded in `meshes` when given, else the conventional
/// `<mesh name>.<ext>`.
///
/// Unsupported mate types and non-orthonormal mate frames are reported in
/// the returned [`RunReport`] rather than failing the run.
pub fn emit_scene(
    tree: &AssemblyTree,
    meshes: Option<&MeshIndex>,
    options: &EmitOptions,
) -> Result<(SceneGraph, RunReport), SceneError> {
    SceneEmitter::new(tree, meshes, options).emit()
}

struct SceneEmitter<'a> {
    tree: &'a AssemblyTree,
    meshes: Option<&'a MeshIndex>,
    options: &'a EmitOptions,
    tolerance: Tolerance,
    graph: SceneGraph,
    link_names: HashSet<String>,
    joint_names: HashSet<String>,
    report: RunReport,
}

impl<'a> SceneEmitter<'a> {
    fn new(tree: &'a AssemblyTree, meshes: Option<&'a MeshIndex>, options: &'a EmitOptions) -> Self {
        Self {
            tree,
            meshes,
            options,
            tolerance: Tolerance::DEFAULT,
            graph: SceneGraph::new(tree.name()),
            link_names: HashSet::new(),
            joint_names: HashSet::new(),
            report: RunReport::new(),
        }
    }

    fn emit(mut self) -> Result<(SceneGraph, RunReport), SceneError> {
        for node in self.tree.rigid_bodies() {
            let link = self.body_link(node);
            self.add_link(link)?;
        }

        // Grouped by parent body, world-attached mates first.
        let mut mates: Vec<&ResolvedMate> = self.tree.mates().iter().collect();
        mates.sort_by_key(|m| m.parent_body);
        for mate in mates {
            self.emit_mate(mate)?;
        }

        self.validate()?;
        info!(
            links = self.graph.links.len(),
            joints = self.graph.joints.len(),
            "scene graph emitted"
        );
        Ok((self.graph, self.report))
    }

    fn body_link(&self, node: &AssemblyNode) -> Link {
        let pose = node.world_transform.to_pose();
        let mass = node
            .mass
            .clone()
            .unwrap_or_else(|| WorldMass::zero_at(node.world_transform.apply_point(&Point3::origin())));
        Link {
            name: node.simplified_name.clone(),
            pose,
            inertial: Inertial {
                mass: mass.mass,
                pose: Pose::at([mass.com.x, mass.com.y, mass.com.z]),
                inertia: InertiaTensor::from_matrix(&mass.inertia),
            },
            visual: self.visual(node, pose),
            synthetic: false,
        }
    }

    fn visual(&self, node: &AssemblyNode, pose: Pose) -> Option<Visual> {
        let file = match self.meshes {
            Some(index) => index.file_for(node.definition.as_ref()?)?.to_string(),
            None => format!("{}.{}", node.mesh_name, self.options.mesh_format.extension()),
        };
        Some(Visual {
            name: format!("{}_visual", node.simplified_name),
            mesh: self.options.mesh_uri(&file),
            pose,
        })
    }

    fn dummy_link(&self, name: String, pose: Pose, child_mass: f64) -> Link {
        Link {
            name,
            pose,
            inertial: Inertial {
                mass: self.options.dummy_mass(child_mass),
                pose: Pose::at(pose.xyz),
                inertia: InertiaTensor::default(),
            },
            visual: None,
            synthetic: true,
        }
    }

    fn add_link(&mut self, link: Link) -> Result<(), SceneError> {
        if !self.link_names.insert(link.name.clone()) {
            return Err(SceneError::DuplicateLink(link.name));
        }
        self.graph.links.push(link);
        Ok(())
    }

    fn emit_mate(&mut self, mate: &ResolvedMate) -> Result<(), SceneError> {
        let record = &mate.record;
        let Some(plan) = plan_for(record.mate_type) else {
            self.report.push(Diagnostic::UnsupportedMate {
                mate: record.name.clone(),
                mate_type: record.mate_type,
            });
            return Ok(());
        };

        let frame = if record.frame_world.is_rigid(&self.tolerance) {
            record.frame_world.clone()
        } else {
            self.report.push(Diagnostic::DegenerateFrame {
                mate: record.name.clone(),
            });
            record.frame_world.without_rotation()
        };
        let pose = frame.to_pose();

        let parent = match mate.parent_body {
            Some(id) => self.tree.node(id).simplified_name.clone(),
            None => self.options.world_link.clone(),
        };
        let child_node = self.tree.node(mate.child_body);
        let child = child_node.simplified_name.clone();
        let child_mass = child_node.mass.as_ref().map_or(0.0, |m| m.mass);
        let base = self.joint_name(&record.name);

        let stages = plan.stages();
        let mut from = parent.clone();
        for stage in stages {
            let (name, to) = match stage.label {
                Some(label) => {
                    let link = format!("{parent}_to_{child}_{}_{label}_link", simplify_name(&base));
                    let dummy = self.dummy_link(link.clone(), pose, child_mass);
                    self.add_link(dummy)?;
                    (format!("{base} {label}"), link)
                }
                None => (base.clone(), child.clone()),
            };
            self.graph.joints.push(Joint {
                name,
                kind: stage.kind,
                parent: from,
                child: to.clone(),
                pose,
                axis: stage.axis,
                mate: record.name.clone(),
                mate_type: record.mate_type,
            });
            from = to;
        }
        debug!(mate = %record.name, %parent, %child, plan = ?plan, "mate emitted");
        Ok(())
    }

    /// Unique joint name for a mate; repeated mate names get a counter suffix.
    fn joint_name(&mut self, mate: &str) -> String {
        if self.joint_names.insert(mate.to_string()) {
            return mate.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{mate} {n}");
            if self.joint_names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn validate(&self) -> Result<(), SceneError> {
        let known = |name: &str| self.link_names.contains(name) || name == self.options.world_link;
        for joint in &self.graph.joints {
            for link in [&joint.parent, &joint.child] {
                if !known(link) {
                    return Err(SceneError::UnknownBody {
                        joint: joint.name.clone(),
                        link: link.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
