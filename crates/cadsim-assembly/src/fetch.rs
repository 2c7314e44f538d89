//! Memoized access to per-definition data from the CAD service.
//!
//! Mass properties and metadata are keyed by [`DefinitionId`], so every
//! distinct definition is fetched once no matter how many occurrences share
//! it. Prefetching runs the independent requests on a rayon pool; the
//! results land in lock-protected caches before the tree walk reads them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cadsim_ir::{DefinitionId, MassProperties, MeshKey, MetadataProperty};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::Snapshot;
use crate::{
    AssemblyError, AssemblyTree, BuildOptions, CadClient, ClientError, Diagnostic, MeshOptions,
    RunReport,
};

/// A cache slot; `None` records a fetch that failed in non-strict mode.
type Slot<T> = Option<T>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fetches and memoizes mass properties, metadata and meshes.
pub struct Fetcher<'c> {
    client: &'c dyn CadClient,
    strict: bool,
    pool: Option<rayon::ThreadPool>,
    mass: Mutex<HashMap<DefinitionId, Slot<MassProperties>>>,
    metadata: Mutex<HashMap<DefinitionId, Slot<Vec<MetadataProperty>>>>,
    report: Mutex<RunReport>,
}

impl<'c> Fetcher<'c> {
    /// Create a fetcher over `client`.
    pub fn new(client: &'c dyn CadClient, options: &BuildOptions) -> Self {
        let pool = if options.fetch_workers > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(options.fetch_workers)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, "could not build fetch pool, using the global pool");
                    None
                }
            }
        } else {
            None
        };
        Self {
            client,
            strict: options.strict,
            pool,
            mass: Mutex::new(HashMap::new()),
            metadata: Mutex::new(HashMap::new()),
            report: Mutex::new(RunReport::new()),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &'c dyn CadClient {
        self.client
    }

    /// Seed the caches from a snapshot so cached definitions are not refetched.
    pub fn seed(&self, snapshot: &Snapshot) {
        let mut mass = lock(&self.mass);
        for (id, props) in &snapshot.mass {
            mass.insert(id.clone(), Some(props.clone()));
        }
        let mut metadata = lock(&self.metadata);
        for (id, props) in &snapshot.metadata {
            metadata.insert(id.clone(), Some(props.clone()));
        }
        debug!(
            mass = snapshot.mass.len(),
            metadata = snapshot.metadata.len(),
            "fetch caches seeded from snapshot"
        );
    }

    /// Successfully fetched records, sorted by definition.
    pub fn cached_mass(&self) -> Vec<(DefinitionId, MassProperties)> {
        let mut out: Vec<_> = lock(&self.mass)
            .iter()
            .filter_map(|(id, slot)| slot.clone().map(|p| (id.clone(), p)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Successfully fetched metadata, sorted by definition.
    pub fn cached_metadata(&self) -> Vec<(DefinitionId, Vec<MetadataProperty>)> {
        let mut out: Vec<_> = lock(&self.metadata)
            .iter()
            .filter_map(|(id, slot)| slot.clone().map(|p| (id.clone(), p)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Take the diagnostics raised by failed fetches so far.
    pub fn take_report(&self) -> RunReport {
        std::mem::take(&mut *lock(&self.report))
    }

    /// Fetch metadata for every id not yet cached, in parallel.
    pub fn prefetch_metadata(&self, ids: &[DefinitionId]) -> Result<(), AssemblyError> {
        let pending = pending(ids, &lock(&self.metadata));
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "prefetching metadata");
        let results = self.run(|| {
            pending
                .par_iter()
                .map(|id| self.client.fetch_metadata(id))
                .collect::<Vec<_>>()
        });
        for (id, result) in pending.into_iter().zip(results) {
            let slot = self.settle(&id, "metadata", result)?;
            lock(&self.metadata).insert(id, slot);
        }
        Ok(())
    }

    /// Fetch mass properties for every id not yet cached, in parallel.
    pub fn prefetch_mass(&self, ids: &[DefinitionId]) -> Result<(), AssemblyError> {
        let pending = pending(ids, &lock(&self.mass));
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "prefetching mass properties");
        let results = self.run(|| {
            pending
                .par_iter()
                .map(|id| self.client.fetch_mass_properties(id))
                .collect::<Vec<_>>()
        });
        for (id, result) in pending.into_iter().zip(results) {
            let slot = self.settle(&id, "mass properties", result)?;
            lock(&self.mass).insert(id, slot);
        }
        Ok(())
    }

    /// Metadata for `id`, fetching it if needed. `None` if the fetch failed.
    pub fn metadata(&self, id: &DefinitionId) -> Result<Option<Vec<MetadataProperty>>, AssemblyError> {
        if let Some(slot) = lock(&self.metadata).get(id) {
            return Ok(slot.clone());
        }
        let slot = self.settle(id, "metadata", self.client.fetch_metadata(id))?;
        lock(&self.metadata).insert(id.clone(), slot.clone());
        Ok(slot)
    }

    /// Mass properties for `id`, fetching them if needed. `None` if the fetch failed.
    pub fn mass_properties(&self, id: &DefinitionId) -> Result<Option<MassProperties>, AssemblyError> {
        if let Some(slot) = lock(&self.mass).get(id) {
            return Ok(slot.clone());
        }
        let slot = self.settle(id, "mass properties", self.client.fetch_mass_properties(id))?;
        lock(&self.mass).insert(id.clone(), slot.clone());
        Ok(slot)
    }

    /// Download one mesh per distinct (document, element, part) among the
    /// tree's rigid bodies and write it under `options.dir`.
    ///
    /// File names come from the first body's mesh name; a name already taken
    /// by another mesh gets the definition stem appended.
    pub fn download_meshes(
        &self,
        tree: &AssemblyTree,
        options: &MeshOptions,
    ) -> Result<MeshIndex, AssemblyError> {
        let ext = options.format.extension();
        let mut jobs: Vec<(MeshKey, DefinitionId, String)> = Vec::new();
        let mut seen: HashSet<MeshKey> = HashSet::new();
        let mut taken: HashSet<String> = HashSet::new();
        for node in tree.rigid_bodies() {
            let Some(id) = &node.definition else { continue };
            let key = id.mesh_key();
            if !seen.insert(key.clone()) {
                continue;
            }
            let mut file = format!("{}.{}", node.mesh_name, ext);
            if !taken.insert(file.clone()) {
                file = format!("{}_{}.{}", node.mesh_name, key.file_stem(), ext);
                taken.insert(file.clone());
            }
            jobs.push((key, id.clone(), file));
        }
        if jobs.is_empty() {
            return Ok(MeshIndex::default());
        }

        fs::create_dir_all(&options.dir).map_err(|source| ClientError::Io {
            path: options.dir.clone(),
            source,
        })?;
        info!(count = jobs.len(), dir = %options.dir.display(), "downloading meshes");

        let results = self.run(|| {
            jobs.par_iter()
                .map(|(_, id, file)| {
                    let bytes = self.client.fetch_mesh_export(id, options.format)?;
                    let path = options.dir.join(file);
                    fs::write(&path, bytes).map_err(|source| ClientError::Io { path, source })
                })
                .collect::<Vec<_>>()
        });

        let mut index = MeshIndex {
            dir: options.dir.clone(),
            files: HashMap::new(),
        };
        for ((key, id, file), result) in jobs.into_iter().zip(results) {
            if self.settle(&id, "mesh", result)?.is_some() {
                index.files.insert(key, file);
            }
        }
        Ok(index)
    }

    fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Turn a fetch result into a cache slot, escalating failures in strict mode.
    fn settle<T>(
        &self,
        id: &DefinitionId,
        what: &'static str,
        result: Result<T, ClientError>,
    ) -> Result<Slot<T>, AssemblyError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(source) if self.strict => Err(AssemblyError::Fetch {
                id: id.clone(),
                what,
                source,
            }),
            Err(source) => {
                lock(&self.report).push(Diagnostic::FetchFailed {
                    id: id.clone(),
                    what,
                    reason: source.to_string(),
                });
                Ok(None)
            }
        }
    }
}

/// Distinct ids absent from `cache`, in sorted order.
fn pending<T>(ids: &[DefinitionId], cache: &HashMap<DefinitionId, T>) -> Vec<DefinitionId> {
    ids.iter()
        .filter(|id| !cache.contains_key(id))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Downloaded mesh file names by mesh identity.
#[derive(Debug, Clone, Default)]
pub struct MeshIndex {
    dir: PathBuf,
    files: HashMap<MeshKey, String>,
}

impl MeshIndex {
    /// File name of the mesh for `id`, if one was downloaded.
    pub fn file_for(&self, id: &DefinitionId) -> Option<&str> {
        self.files.get(&id.mesh_key()).map(String::as_str)
    }

    /// Directory the meshes were written to.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Number of downloaded meshes.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing was downloaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
