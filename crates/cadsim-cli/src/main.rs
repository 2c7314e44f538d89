//! cadsim CLI - CAD assembly to simulator scene conversion
//!
//! Reads an offline export of a CAD assembly (see `DirectoryClient`) and
//! prints its assembly tree, its resolved mates, or the converted scene graph.

use anyhow::{Context, Result};
use cadsim_assembly::{
    load_definition, AssemblyTree, DirectoryClient, Fetcher, MeshFormat, RunReport, Snapshot,
    SnapshotCache, TreeBuilder,
};
use cadsim_ir::{compact::format_scene, VersionSelector};
use cadsim_scene::emit_scene;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::info;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "cadsim")]
#[command(about = "Convert CAD assemblies into simulator scene graphs", long_about = None)]
struct Cli {
    /// TOML file with [build], [emit] and [mesh] options
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fail on the first fetch error instead of substituting defaults
    #[arg(long, global = true)]
    strict: bool,

    /// Worker threads for parallel fetches (0 = one per core)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an assembly into a scene graph
    Convert {
        #[command(flatten)]
        source: SourceArgs,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Download rigid-body meshes into this directory
        #[arg(long)]
        meshes: Option<PathBuf>,
        /// Mesh export format
        #[arg(long, value_enum)]
        mesh_format: Option<MeshFormatArg>,
    },
    /// Print the reconstructed assembly tree
    Tree {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List mates with the rigid bodies they connect
    Mates {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Export directory holding assembly.json, mass/, metadata/ and meshes/
    source: PathBuf,
    /// Document id of the assembly
    #[arg(long, default_value = "local")]
    document: String,
    /// Element id of the assembly
    #[arg(long, default_value = "assembly")]
    element: String,
    /// Revision: w/<id>, v/<id> or m/<id>
    #[arg(long, default_value = "w/main")]
    version: VersionSelector,
    /// Model name (default: the export directory's name)
    #[arg(short, long)]
    name: Option<String>,
    /// Snapshot cache directory; skips fetching on repeated runs
    #[arg(long)]
    cache: Option<PathBuf>,
}

impl SourceArgs {
    fn model_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.source
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("model")
                .to_string()
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Compact,
}

#[derive(Clone, Copy, ValueEnum)]
enum MeshFormatArg {
    Stl,
    Obj,
}

impl From<MeshFormatArg> for MeshFormat {
    fn from(arg: MeshFormatArg) -> Self {
        match arg {
            MeshFormatArg::Stl => MeshFormat::Stl,
            MeshFormatArg::Obj => MeshFormat::Obj,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.strict {
        config.build.strict = true;
    }
    if let Some(workers) = cli.workers {
        config.build.fetch_workers = workers;
    }

    match cli.command {
        Commands::Convert {
            source,
            output,
            format,
            meshes,
            mesh_format,
        } => {
            if let Some(format) = mesh_format {
                config.mesh.format = format.into();
                config.emit.mesh_format = format.into();
            }
            let download_meshes = meshes.is_some();
            if let Some(dir) = meshes {
                config.mesh.dir = dir;
            }
            convert(&source, &config, output, format, download_meshes)?;
        }
        Commands::Tree { source } => {
            let client = DirectoryClient::new(&source.source);
            let fetcher = Fetcher::new(&client, &config.build);
            let (tree, report) = build(&source, &client, &fetcher, &config)?;
            print!("{}", tree.render());
            eprintln!("{}", report.summary());
        }
        Commands::Mates { source } => {
            let client = DirectoryClient::new(&source.source);
            let fetcher = Fetcher::new(&client, &config.build);
            let (tree, report) = build(&source, &client, &fetcher, &config)?;
            show_mates(&tree, &config.emit.world_link);
            eprintln!("{}", report.summary());
        }
    }

    Ok(())
}

/// Load the definition (through the cache if configured) and build the tree.
fn build(
    source: &SourceArgs,
    client: &DirectoryClient,
    fetcher: &Fetcher<'_>,
    config: &Config,
) -> Result<(AssemblyTree, RunReport)> {
    let cache = source.cache.as_ref().map(SnapshotCache::new);
    let definition = load_definition(
        client,
        fetcher,
        cache.as_ref(),
        &source.document,
        &source.element,
        &source.version,
    )
    .with_context(|| format!("Failed to load assembly from {}", source.source.display()))?;

    let (tree, report) =
        TreeBuilder::new(&definition, fetcher, &config.build, source.version.clone())?
            .build(&source.model_name())?;

    if let Some(cache) = &cache {
        let path = cache.store(
            &source.document,
            &source.element,
            &source.version,
            &Snapshot::capture(&definition, fetcher),
        )?;
        info!(path = %path.display(), "snapshot cached");
    }
    Ok((tree, report))
}

fn convert(
    source: &SourceArgs,
    config: &Config,
    output: Option<PathBuf>,
    format: OutputFormat,
    download_meshes: bool,
) -> Result<()> {
    let client = DirectoryClient::new(&source.source);
    let fetcher = Fetcher::new(&client, &config.build);
    let (tree, mut report) = build(source, &client, &fetcher, config)?;

    let meshes = if download_meshes {
        Some(fetcher.download_meshes(&tree, &config.mesh)?)
    } else {
        None
    };
    report.merge(fetcher.take_report());

    let (scene, scene_report) = emit_scene(&tree, meshes.as_ref(), &config.emit)?;
    report.merge(scene_report);

    let text = match format {
        OutputFormat::Json => scene.to_json()?,
        OutputFormat::Compact => format_scene(&scene),
    };
    match output {
        Some(path) => {
            fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote {} links and {} joints to {}",
                scene.links.len(),
                scene.joints.len(),
                path.display()
            );
        }
        None => print!("{text}"),
    }
    eprintln!("{}", report.summary());
    Ok(())
}

fn show_mates(tree: &AssemblyTree, world_link: &str) {
    for mate in tree.mates() {
        let parent = mate
            .parent_body
            .map_or(world_link, |id| tree.node(id).simplified_name.as_str());
        let child = &tree.node(mate.child_body).simplified_name;
        println!(
            "{:<24} {:<12} {} -> {}  [{}]",
            mate.record.name,
            mate.record.mate_type.as_str(),
            parent,
            child,
            mate.record.owner
        );
    }
}
