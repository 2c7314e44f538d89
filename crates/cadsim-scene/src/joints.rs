//! Mate type to joint mapping.
//!
//! Single-axis joints always actuate about the local Z axis of the mate
//! frame. Planar and cylindrical mates have no single simulator joint; they
//! become a chain of joints through intermediate links.

use cadsim_ir::{JointKind, MateType};

/// Unit X axis.
pub const AXIS_X: [f64; 3] = [1.0, 0.0, 0.0];
/// Unit Y axis.
pub const AXIS_Y: [f64; 3] = [0.0, 1.0, 0.0];
/// Unit Z axis.
pub const AXIS_Z: [f64; 3] = [0.0, 0.0, 1.0];

/// How one mate becomes joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointPlan {
    /// One joint of the given kind.
    Single(JointKind),
    /// Prismatic along X, prismatic along Y, then revolute about Z.
    Planar,
    /// Prismatic along Z, then revolute about Z.
    Cylindrical,
}

/// One joint in the chain a mate expands to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    /// Axis label for intermediate stages; `None` for the stage ending at the child.
    pub label: Option<&'static str>,
    /// Joint type.
    pub kind: JointKind,
    /// Motion axis in the mate frame.
    pub axis: Option<[f64; 3]>,
}

impl JointPlan {
    /// Joints from the parent link to the child link, in chain order.
    ///
    /// Every stage but the last ends at a new intermediate link.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            JointPlan::Single(kind) => vec![final_stage(*kind)],
            JointPlan::Planar => vec![
                intermediate("x", AXIS_X),
                intermediate("y", AXIS_Y),
                final_stage(JointKind::Revolute),
            ],
            JointPlan::Cylindrical => vec![intermediate("z", AXIS_Z), final_stage(JointKind::Revolute)],
        }
    }

    /// Number of intermediate links the plan introduces.
    pub fn intermediate_links(&self) -> usize {
        match self {
            JointPlan::Single(_) => 0,
            JointPlan::Planar => 2,
            JointPlan::Cylindrical => 1,
        }
    }
}

fn intermediate(label: &'static str, axis: [f64; 3]) -> Stage {
    Stage {
        label: Some(label),
        kind: JointKind::Prismatic,
        axis: Some(axis),
    }
}

fn final_stage(kind: JointKind) -> Stage {
    Stage {
        label: None,
        kind,
        axis: axis_for(kind),
    }
}

/// Joint plan for a mate type; `None` if the type has no joint mapping.
pub fn plan_for(mate_type: MateType) -> Option<JointPlan> {
    match mate_type {
        MateType::Revolute => Some(JointPlan::Single(JointKind::Revolute)),
        MateType::Fastened => Some(JointPlan::Single(JointKind::Fixed)),
        MateType::Slider => Some(JointPlan::Single(JointKind::Prismatic)),
        MateType::Ball => Some(JointPlan::Single(JointKind::Ball)),
        MateType::Planar => Some(JointPlan::Planar),
        MateType::Cylindrical => Some(JointPlan::Cylindrical),
        MateType::PinSlot | MateType::Parallel | MateType::Tangent | MateType::Unknown => None,
    }
}

/// Axis of a single-axis joint kind.
pub fn axis_for(kind: JointKind) -> Option<[f64; 3]> {
    match kind {
        JointKind::Revolute | JointKind::Prismatic => Some(AXIS_Z),
        JointKind::Fixed | JointKind::Ball => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        assert_eq!(plan_for(MateType::Revolute), Some(JointPlan::Single(JointKind::Revolute)));
        assert_eq!(plan_for(MateType::Fastened), Some(JointPlan::Single(JointKind::Fixed)));
        assert_eq!(plan_for(MateType::Slider), Some(JointPlan::Single(JointKind::Prismatic)));
        assert_eq!(plan_for(MateType::Ball), Some(JointPlan::Single(JointKind::Ball)));
        assert_eq!(plan_for(MateType::Planar), Some(JointPlan::Planar));
        assert_eq!(plan_for(MateType::Cylindrical), Some(JointPlan::Cylindrical));
        assert_eq!(plan_for(MateType::PinSlot), None);
        assert_eq!(plan_for(MateType::Unknown), None);
    }

    #[test]
    fn test_single_axis_joints_use_z() {
        let stages = JointPlan::Single(JointKind::Prismatic).stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].axis, Some(AXIS_Z));
        assert_eq!(JointPlan::Single(JointKind::Ball).stages()[0].axis, None);
    }

    #[test]
    fn test_compound_stage_chains() {
        for plan in [JointPlan::Planar, JointPlan::Cylindrical] {
            let stages = plan.stages();
            assert_eq!(stages.len(), plan.intermediate_links() + 1);
            let last = stages.last().unwrap();
            assert_eq!(last.kind, JointKind::Revolute);
            assert_eq!(last.label, None);
            assert!(stages[..stages.len() - 1]
                .iter()
                .all(|s| s.kind == JointKind::Prismatic && s.label.is_some()));
        }
        let planar = JointPlan::Planar.stages();
        assert_eq!(planar[0].axis, Some(AXIS_X));
        assert_eq!(planar[1].axis, Some(AXIS_Y));
    }
}
