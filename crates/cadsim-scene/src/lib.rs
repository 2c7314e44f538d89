#![warn(missing_docs)]

//! Scene graph emission for CAD-to-simulator conversion.
//!
//! Takes a finalized [`AssemblyTree`](cadsim_assembly::AssemblyTree) and
//! produces the abstract [`SceneGraph`](cadsim_ir::SceneGraph): one link per
//! rigid body and one joint per resolved mate.
//!
//! # Mate mapping
//!
//! | Mate | Joints |
//! |---|---|
//! | `REVOLUTE` | revolute about Z |
//! | `FASTENED` | fixed |
//! | `SLIDER` | prismatic along Z |
//! | `BALL` | ball |
//! | `PLANAR` | prismatic X, prismatic Y, revolute Z (two intermediate links) |
//! | `CYLINDRICAL` | prismatic Z, revolute Z (one intermediate link) |
//!
//! # Example
//!
//! ```ignore
//! let (tree, _) = build_tree(&definition, &fetcher, &BuildOptions::default(), "robot")?;
//! let (scene, report) = emit_scene(&tree, None, &EmitOptions::default())?;
//! println!("{}", cadsim_ir::compact::format_scene(&scene));
//! ```

mod emit;
mod error;
pub mod joints;
mod options;

pub use emit::emit_scene;
pub use error::SceneError;
pub use joints::{plan_for, JointPlan, Stage};
pub use options::EmitOptions;
