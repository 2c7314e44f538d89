#![warn(missing_docs)]

//! Math types for CAD-to-simulator conversion.
//!
//! Thin wrappers around nalgebra providing the homogeneous transforms,
//! Euler-angle poses and mass-property re-expression used when flattening
//! a CAD assembly into rigid bodies and joints.

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

mod euler;
mod mass;

pub use euler::{euler_to_rotation, euler_to_transform, rotation_to_euler, GIMBAL_LOCK_THRESHOLD};
pub use mass::{reexpress_mass_in_world_frame, WorldMass};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A 3x3 matrix (rotation blocks and inertia tensors).
pub type Mat3 = Matrix3<f64>;

/// A 4x4 homogeneous transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Build a transform from a rotation block and a translation.
    pub fn from_parts(rotation: &Mat3, translation: &Vec3) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { matrix: m }
    }

    /// Build a transform from 16 values in row-major order.
    ///
    /// This is how the CAD service encodes occurrence transforms. Returns
    /// `None` unless exactly 16 values are supplied.
    pub fn from_row_major(values: &[f64]) -> Option<Self> {
        if values.len() != 16 {
            return None;
        }
        Some(Self {
            matrix: Matrix4::from_row_slice(values),
        })
    }

    /// Build the local frame of a mate connector.
    ///
    /// The rotation columns are the three supplied axes and the translation
    /// is `origin`. Orthonormality is not checked; see [`Transform::is_rigid`].
    pub fn compose_mate_frame(x_axis: &Vec3, y_axis: &Vec3, z_axis: &Vec3, origin: &Vec3) -> Self {
        let rotation = Mat3::from_columns(&[*x_axis, *y_axis, *z_axis]);
        Self::from_parts(&rotation, origin)
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Upper-left 3x3 rotation block.
    pub fn rotation(&self) -> Mat3 {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Translation column.
    pub fn translation_part(&self) -> Vec3 {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Copy of this transform with the rotation block replaced by identity.
    pub fn without_rotation(&self) -> Self {
        Self::from_parts(&Mat3::identity(), &self.translation_part())
    }

    /// Round every entry to `decimals` decimal places.
    pub fn rounded(&self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        Self {
            matrix: self.matrix.map(|v| (v * scale).round() / scale),
        }
    }

    /// Whether the rotation block is orthonormal with positive determinant.
    pub fn is_rigid(&self, tol: &Tolerance) -> bool {
        let r = self.rotation();
        let gram = r.transpose() * r;
        (gram - Mat3::identity()).abs().max() < tol.angular && tol.angles_equal(r.determinant(), 1.0)
    }

    /// Decompose into a position and roll/pitch/yaw pose.
    pub fn to_pose(&self) -> Pose {
        let t = self.translation_part();
        let (roll, pitch, yaw) = rotation_to_euler(&self.rotation());
        Pose {
            xyz: [t.x, t.y, t.z],
            rpy: [roll, pitch, yaw],
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position plus roll/pitch/yaw orientation, in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position `[x, y, z]`.
    pub xyz: [f64; 3],
    /// Orientation `[roll, pitch, yaw]` in radians.
    pub rpy: [f64; 3],
}

impl Pose {
    /// Pose at `xyz` with no rotation.
    pub fn at(xyz: [f64; 3]) -> Self {
        Self { xyz, rpy: [0.0; 3] }
    }

    /// The homogeneous transform this pose describes.
    pub fn to_transform(&self) -> Transform {
        let rotation = euler_to_rotation(self.rpy[0], self.rpy[1], self.rpy[2]);
        Transform::from_parts(&rotation, &Vec3::new(self.xyz[0], self.xyz[1], self.xyz[2]))
    }
}

/// Tolerance for rotation checks on mate frames.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Angular / unitless tolerance.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerance (1e-6).
    pub const DEFAULT: Self = Self { angular: 1e-6 };

    /// Check if two angles (or unitless quantities) are effectively equal.
    pub fn angles_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.angular
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
