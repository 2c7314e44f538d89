//! Abstract scene graph handed to a scene-description writer.

use cadsim_math::{Mat3, Pose};
use serde::{Deserialize, Serialize};

use crate::MateType;

/// Links and joints of one converted assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneGraph {
    /// Model name.
    pub name: String,
    /// Rigid bodies, in emission order.
    pub links: Vec<Link>,
    /// Joints between links.
    pub joints: Vec<Joint>,
}

impl SceneGraph {
    /// Create an empty scene graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
        }
    }

    /// Find a link by name.
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Find a joint by name.
    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Joints whose parent is `link`.
    pub fn joints_from<'a>(&'a self, link: &'a str) -> impl Iterator<Item = &'a Joint> + 'a {
        self.joints.iter().filter(move |j| j.parent == link)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link name.
    pub name: String,
    /// World pose of the body's element frame.
    pub pose: Pose,
    /// Mass properties.
    pub inertial: Inertial,
    /// Mesh shown for the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<Visual>,
    /// Intermediate link introduced by a compound joint.
    #[serde(default)]
    pub synthetic: bool,
}

/// Mass, center of mass and inertia of a link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inertial {
    /// Mass in kg.
    pub mass: f64,
    /// Center of mass in world coordinates; rotation is identity since the
    /// inertia is world-aligned.
    pub pose: Pose,
    /// Inertia about the center of mass.
    pub inertia: InertiaTensor,
}

/// Upper triangle of a symmetric inertia tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InertiaTensor {
    /// Ixx.
    pub ixx: f64,
    /// Ixy.
    pub ixy: f64,
    /// Ixz.
    pub ixz: f64,
    /// Iyy.
    pub iyy: f64,
    /// Iyz.
    pub iyz: f64,
    /// Izz.
    pub izz: f64,
}

impl InertiaTensor {
    /// Take the upper triangle of `m`.
    pub fn from_matrix(m: &Mat3) -> Self {
        Self {
            ixx: m[(0, 0)],
            ixy: m[(0, 1)],
            ixz: m[(0, 2)],
            iyy: m[(1, 1)],
            iyz: m[(1, 2)],
            izz: m[(2, 2)],
        }
    }

    /// Rebuild the full symmetric matrix.
    pub fn to_matrix(&self) -> Mat3 {
        Mat3::new(
            self.ixx, self.ixy, self.ixz, //
            self.ixy, self.iyy, self.iyz, //
            self.ixz, self.iyz, self.izz,
        )
    }
}

/// Mesh reference for a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    /// Visual element name.
    pub name: String,
    /// Mesh location (relative path or URI).
    pub mesh: String,
    /// World pose of the mesh frame.
    pub pose: Pose,
}

/// Simulator joint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    /// No relative motion.
    Fixed,
    /// Rotation about `axis`.
    Revolute,
    /// Translation along `axis`.
    Prismatic,
    /// Spherical.
    Ball,
}

impl JointKind {
    /// Lower-case type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JointKind::Fixed => "fixed",
            JointKind::Revolute => "revolute",
            JointKind::Prismatic => "prismatic",
            JointKind::Ball => "ball",
        }
    }
}

/// A joint between two links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Joint name; the mate name, suffixed for compound stages.
    pub name: String,
    /// Joint type.
    pub kind: JointKind,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// World pose of the joint frame.
    pub pose: Pose,
    /// Motion axis in the joint frame, for revolute and prismatic joints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<[f64; 3]>,
    /// Name of the mate this joint came from.
    pub mate: String,
    /// Mate type this joint came from.
    pub mate_type: MateType,
}
