//! Mass-property re-expression between element and world frames.

use crate::{Mat3, Point3, Transform};

/// Mass properties of one body expressed in the world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldMass {
    /// Mass in kg. Frame-invariant.
    pub mass: f64,
    /// Center of mass in world coordinates.
    pub com: Point3,
    /// Inertia tensor about the center of mass, in world-aligned axes.
    pub inertia: Mat3,
}

impl WorldMass {
    /// A body with no mass at the given point.
    pub fn zero_at(com: Point3) -> Self {
        Self {
            mass: 0.0,
            com,
            inertia: Mat3::zeros(),
        }
    }
}

/// Re-express element-local mass properties in the world frame.
///
/// The center of mass is mapped as a homogeneous point. The inertia tensor
/// (taken about the center of mass) is rotated into world-aligned axes:
/// `I_world = R * I_local * Rᵀ`, with `R` the rotation of `world_tform_element`.
pub fn reexpress_mass_in_world_frame(
    world_tform_element: &Transform,
    mass: f64,
    com_local: &Point3,
    inertia_local: &Mat3,
) -> WorldMass {
    let r = world_tform_element.rotation();
    WorldMass {
        mass,
        com: world_tform_element.apply_point(com_local),
        inertia: r * inertia_local * r.transpose(),
    }
}
