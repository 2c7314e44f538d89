//! Compact line-based dump of a [`SceneGraph`].
//!
//! One record per line, names quoted when they contain whitespace:
//!
//! ```text
//! # cadsim scene <name>
//! L name mass cx cy cz ixx ixy ixz iyy iyz izz [mesh]
//! D name mass cx cy cz                             # synthetic link
//! J name kind parent child x y z roll pitch yaw [ax ay az]
//! ```
//!
//! Intended for diffs and quick inspection, not as an interchange format.

use std::fmt;

use crate::{Joint, Link, SceneGraph};

/// Render `scene` in the compact format.
pub fn format_scene(scene: &SceneGraph) -> String {
    Compact(scene).to_string()
}

struct Compact<'a>(&'a SceneGraph);

impl fmt::Display for Compact<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scene = self.0;
        writeln!(f, "# cadsim scene {}", escape_id(&scene.name))?;
        for link in &scene.links {
            write_link(f, link)?;
        }
        for joint in &scene.joints {
            write_joint(f, joint)?;
        }
        Ok(())
    }
}

fn write_link(f: &mut fmt::Formatter<'_>, link: &Link) -> fmt::Result {
    let inertial = &link.inertial;
    let [cx, cy, cz] = inertial.pose.xyz;
    if link.synthetic {
        return writeln!(
            f,
            "D {} {} {} {} {}",
            escape_id(&link.name),
            inertial.mass,
            cx,
            cy,
            cz
        );
    }
    let i = &inertial.inertia;
    write!(
        f,
        "L {} {} {} {} {} {} {} {} {} {} {}",
        escape_id(&link.name),
        inertial.mass,
        cx,
        cy,
        cz,
        i.ixx,
        i.ixy,
        i.ixz,
        i.iyy,
        i.iyz,
        i.izz
    )?;
    if let Some(visual) = &link.visual {
        write!(f, " {}", escape_id(&visual.mesh))?;
    }
    writeln!(f)
}

fn write_joint(f: &mut fmt::Formatter<'_>, joint: &Joint) -> fmt::Result {
    let [x, y, z] = joint.pose.xyz;
    let [roll, pitch, yaw] = joint.pose.rpy;
    write!(
        f,
        "J {} {} {} {} {} {} {} {} {} {}",
        escape_id(&joint.name),
        joint.kind.as_str(),
        escape_id(&joint.parent),
        escape_id(&joint.child),
        x,
        y,
        z,
        roll,
        pitch,
        yaw
    )?;
    if let Some([ax, ay, az]) = joint.axis {
        write!(f, " {} {} {}", ax, ay, az)?;
    }
    writeln!(f)
}

/// Quote an identifier if it contains whitespace or quotes, or is empty.
fn escape_id(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) || s.contains('"') {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Inertial, InertiaTensor, JointKind, MateType, Visual};
    use cadsim_math::Pose;

    fn scene() -> SceneGraph {
        let mut scene = SceneGraph::new("cart");
        scene.links.push(Link {
            name: "body_0".into(),
            pose: Pose::default(),
            inertial: Inertial {
                mass: 2.0,
                pose: Pose::at([0.0, 0.0, 0.5]),
                inertia: InertiaTensor {
                    ixx: 1.0,
                    iyy: 1.0,
                    izz: 1.0,
                    ..Default::default()
                },
            },
            visual: Some(Visual {
                name: "body_0_visual".into(),
                mesh: "meshes/body.stl".into(),
                pose: Pose::default(),
            }),
            synthetic: false,
        });
        scene.links.push(Link {
            name: "dummy".into(),
            pose: Pose::default(),
            inertial: Inertial {
                mass: 0.002,
                pose: Pose::default(),
                inertia: InertiaTensor::default(),
            },
            visual: None,
            synthetic: true,
        });
        scene.joints.push(Joint {
            name: "Slider 1 z".into(),
            kind: JointKind::Prismatic,
            parent: "body_0".into(),
            child: "dummy".into(),
            pose: Pose::default(),
            axis: Some([0.0, 0.0, 1.0]),
            mate: "Slider 1".into(),
            mate_type: MateType::Cylindrical,
        });
        scene
    }

    #[test]
    fn test_format_scene_lines() {
        let text = format_scene(&scene());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# cadsim scene cart");
        assert_eq!(lines[1], "L body_0 2 0 0 0.5 1 0 0 1 0 1 meshes/body.stl");
        assert_eq!(lines[2], "D dummy 0.002 0 0 0");
        assert_eq!(lines[3], "J \"Slider 1 z\" prismatic body_0 dummy 0 0 0 0 0 0 0 0 1");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_escape_id() {
        assert_eq!(escape_id("plain"), "plain");
        assert_eq!(escape_id("two words"), "\"two words\"");
        assert_eq!(escape_id(""), "\"\"");
        assert_eq!(escape_id("a\"b"), "\"a\\\"b\"");
    }
}
