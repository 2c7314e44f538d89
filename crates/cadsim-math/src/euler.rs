//! Roll/pitch/yaw conversion for rotation matrices.
//!
//! Convention: `R = Rz(yaw) * Ry(pitch) * Rx(roll)`, which is the
//! fixed-axis X-Y-Z sequence used by scene-description poses
//! (`x y z roll pitch yaw`).

use nalgebra::Rotation3;

use crate::{Mat3, Transform, Vec3};

/// Below this value of `sqrt(r00² + r10²)` the decomposition is treated as
/// gimbal-locked and yaw is forced to zero.
pub const GIMBAL_LOCK_THRESHOLD: f64 = 1e-6;

/// Decompose a rotation matrix into `(roll, pitch, yaw)` in radians.
///
/// At the gimbal-lock singularity only the composed rotation is meaningful;
/// the returned angles put the whole remaining rotation into roll.
pub fn rotation_to_euler(r: &Mat3) -> (f64, f64, f64) {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();
    if sy < GIMBAL_LOCK_THRESHOLD {
        let roll = (-r[(1, 2)]).atan2(r[(1, 1)]);
        let pitch = (-r[(2, 0)]).atan2(sy);
        return (roll, pitch, 0.0);
    }
    Rotation3::from_matrix_unchecked(*r).euler_angles()
}

/// Build a rotation matrix from `(roll, pitch, yaw)` in radians.
pub fn euler_to_rotation(roll: f64, pitch: f64, yaw: f64) -> Mat3 {
    Rotation3::from_euler_angles(roll, pitch, yaw).into_inner()
}

/// Build a pure-rotation transform from `(roll, pitch, yaw)` in radians.
pub fn euler_to_transform(roll: f64, pitch: f64, yaw: f64) -> Transform {
    Transform::from_parts(&euler_to_rotation(roll, pitch, yaw), &Vec3::zeros())
}
