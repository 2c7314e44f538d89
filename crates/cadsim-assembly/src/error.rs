//! Error types for assembly reconstruction.

use std::path::PathBuf;

use cadsim_ir::{DefinitionId, OccurrencePath};
use thiserror::Error;

/// Failures reported by a [`CadClient`](crate::CadClient).
#[derive(Error, Debug)]
pub enum ClientError {
    /// Reading or writing a local file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A response body could not be decoded.
    #[error("Invalid {what} response: {source}")]
    Json {
        /// What was being decoded.
        what: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A server-side export job ended in a state other than done.
    #[error("Export job {job} terminated with state {state}")]
    JobFailed {
        /// Job id.
        job: String,
        /// Terminal state reported by the service.
        state: String,
    },

    /// A server-side export job was still active after the last poll.
    #[error("Export job {job} still active after {polls} polls")]
    JobTimeout {
        /// Job id.
        job: String,
        /// Number of status requests made.
        polls: u32,
    },
}

/// Fatal errors that abort a conversion run.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// An instance or mate references an occurrence the payload does not list.
    #[error("Occurrence not found: {path}")]
    MissingOccurrence {
        /// Global occurrence path.
        path: OccurrencePath,
    },

    /// An assembly instance references a subassembly the payload does not define.
    #[error("Subassembly definition not found: {element_id}")]
    MissingSubassembly {
        /// Element id of the subassembly.
        element_id: String,
    },

    /// An occurrence transform does not have 16 entries.
    #[error("Occurrence {path} has a malformed transform ({len} values)")]
    MalformedTransform {
        /// Global occurrence path.
        path: OccurrencePath,
        /// Number of values found.
        len: usize,
    },

    /// A mate feature cannot be interpreted.
    #[error("Malformed mate '{mate}': {reason}")]
    MalformedMate {
        /// Mate name.
        mate: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A per-definition fetch failed in strict mode.
    #[error("Failed to fetch {what} for {id}: {source}")]
    Fetch {
        /// Definition being fetched.
        id: DefinitionId,
        /// `"mass properties"`, `"metadata"` or `"mesh"`.
        what: &'static str,
        /// Collaborator error.
        #[source]
        source: ClientError,
    },

    /// The collaborator failed on a request the run cannot do without.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Reading or writing the snapshot cache failed.
    #[error("Snapshot cache error at {path}: {reason}")]
    Cache {
        /// Cache file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}
