//! Error types for scene emission.

use thiserror::Error;

/// Errors that abort scene emission.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Two links would share a name.
    #[error("Duplicate link name: {0}")]
    DuplicateLink(String),

    /// A joint references a link that was never emitted.
    #[error("Joint '{joint}' references unknown link '{link}'")]
    UnknownBody {
        /// Joint name.
        joint: String,
        /// Missing link name.
        link: String,
    },
}
