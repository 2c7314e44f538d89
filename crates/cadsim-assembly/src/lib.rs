#![warn(missing_docs)]

//! Assembly tree reconstruction for CAD-to-simulator conversion.
//!
//! Turns a flat, occurrence-based assembly definition from the CAD service
//! into a rooted tree of occurrences with world transforms, rigid-body flags
//! and world-frame mass properties, and attributes every mate to the nearest
//! enclosing rigid bodies on both sides.
//!
//! The CAD service is reached only through the [`CadClient`] trait, passed in
//! explicitly; [`DirectoryClient`] serves an offline export.
//!
//! ```ignore
//! let client = DirectoryClient::new("export/");
//! let definition = client.fetch_assembly_definition(doc, element, &version)?;
//! let fetcher = Fetcher::new(&client, &options);
//! let (tree, report) = build_tree(&definition, &fetcher, &options, "robot")?;
//! ```

mod cache;
mod client;
mod error;
mod fetch;
pub mod index;
mod options;
mod report;
mod tree;

pub use cache::{Snapshot, SnapshotCache};
pub use client::{
    poll_until_done, CadClient, CallCounts, DirectoryClient, JobStatus, MemoryClient,
};
pub use error::{AssemblyError, ClientError};
pub use fetch::{Fetcher, MeshIndex};
pub use index::{DocumentIndex, MateIndex, MateRecord, OccurrenceInfo};
pub use options::{BuildOptions, MeshFormat, MeshOptions, DEFAULT_RIGID_BODY_PROPERTY};
pub use report::{Diagnostic, RunReport};
pub use tree::{
    build_tree, mesh_name, simplify_name, AssemblyNode, AssemblyTree, NodeId, NodeState,
    ResolvedMate, RigidBodyIndex, TreeBuilder,
};

use cadsim_ir::{AssemblyDefinition, VersionSelector};
use tracing::info;

/// Load an assembly definition, consulting `cache` first.
///
/// On a cache hit the fetcher is seeded with the cached mass and metadata
/// records so none of them are requested again.
pub fn load_definition(
    client: &dyn CadClient,
    fetcher: &Fetcher<'_>,
    cache: Option<&SnapshotCache>,
    document_id: &str,
    element_id: &str,
    version: &VersionSelector,
) -> Result<AssemblyDefinition, AssemblyError> {
    if let Some(cache) = cache {
        if let Some(snapshot) = cache.load(document_id, element_id, version)? {
            info!(document_id, element_id, %version, "using cached snapshot");
            fetcher.seed(&snapshot);
            return Ok(snapshot.definition);
        }
    }
    Ok(client.fetch_assembly_definition(document_id, element_id, version)?)
}
