//! CLI binary for sdz: package composed scenes into self-contained archives.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sdz_core::PackConfig;
use sdz_core::config::{LayoutPolicy, RewriteFailurePolicy, UnresolvedPolicy};
use sdz_core::{FsResolver, paths};
use sdz_layer::LayerRegistry;
use sdz_package::archive::ArchiveReader;
use sdz_package::{PackageRequest, Packager, Profile};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sdz", about = "Self-contained scene packages", version)]
struct Cli {
    /// Project root holding .sdz/config.toml (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package a root layer and everything it references
    Pack {
        /// Root layer (.sda, .sdc, or .sd)
        asset: PathBuf,

        /// Output package path
        output: PathBuf,

        /// Name of the root entry inside the package
        #[arg(long)]
        first_layer_name: Option<String>,

        /// Apply the compatibility profile (flattened variants, allow-listed
        /// formats, compiled root)
        #[arg(long)]
        compat: bool,

        /// Entry naming: flat, preserve
        #[arg(long)]
        layout: Option<LayoutPolicy>,

        /// Fail on any unresolved reference or rewrite failure
        #[arg(long)]
        strict: bool,

        /// Extra directory to resolve bare asset paths against (repeatable)
        #[arg(short = 'I', long = "search-path")]
        search_paths: Vec<PathBuf>,

        /// Print the package report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the dependencies a package would contain
    Deps {
        /// Root layer
        asset: PathBuf,

        /// Extra directory to resolve bare asset paths against (repeatable)
        #[arg(short = 'I', long = "search-path")]
        search_paths: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the entries of a package
    List {
        /// Package path
        package: PathBuf,
    },

    /// Check entry checksums and payload alignment
    Verify {
        /// Package path
        package: PathBuf,

        /// Expected payload alignment (defaults to the configured alignment)
        #[arg(long)]
        alignment: Option<u16>,
    },
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;
    let config = PackConfig::load(&project_root)
        .with_context(|| format!("failed to load config from {}", project_root.display()))?;

    match cli.command {
        Commands::Pack {
            asset,
            output,
            first_layer_name,
            compat,
            layout,
            strict,
            search_paths,
            json,
        } => {
            let mut config = config;
            if let Some(layout) = layout {
                config.layout.policy = layout;
            }
            if strict {
                config.discovery.unresolved = UnresolvedPolicy::Fail;
                config.rewrite.on_failure = RewriteFailurePolicy::Strict;
            }
            let profile = if compat {
                Profile::Compatibility
            } else {
                Profile::Standard
            };
            cmd_pack(&asset, &output, first_layer_name, profile, &search_paths, config, json)
        }
        Commands::Deps {
            asset,
            search_paths,
            json,
        } => cmd_deps(&asset, &search_paths, config, json),
        Commands::List { package } => cmd_list(&package),
        Commands::Verify { package, alignment } => {
            cmd_verify(&package, alignment.unwrap_or(config.archive.alignment))
        }
    }
}

fn make_resolver(asset: &Path, search_paths: &[PathBuf]) -> Result<FsResolver> {
    let resolver = FsResolver::for_asset(asset)
        .with_context(|| format!("cannot set up resolution for {}", asset.display()))?;
    Ok(search_paths
        .iter()
        .fold(resolver, |r, dir| r.with_search_path(dir)))
}

fn root_asset(asset: &Path) -> Result<String> {
    let absolute = std::path::absolute(asset)
        .with_context(|| format!("invalid asset path {}", asset.display()))?;
    Ok(absolute.to_string_lossy().into_owned())
}

fn cmd_pack(
    asset: &Path,
    output: &Path,
    first_layer_name: Option<String>,
    profile: Profile,
    search_paths: &[PathBuf],
    config: PackConfig,
    json: bool,
) -> Result<()> {
    let resolver = make_resolver(asset, search_paths)?;
    let session = LayerRegistry::new();
    let mut request = PackageRequest::new(root_asset(asset)?, output).with_profile(profile);
    request.first_entry_name = first_layer_name;

    let report = Packager::new(&resolver, &session)
        .with_config(config)
        .package(&request)
        .with_context(|| format!("failed to package {}", asset.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "Packaged {} entries ({} bytes) into {}",
        report.entries.len(),
        report.archive_bytes,
        report.output.display()
    );
    for entry in &report.entries {
        println!("  {:<40} {:>10} bytes  <- {}", entry.name, entry.size, entry.source);
    }
    if !report.diagnostics.is_empty() {
        println!("\nWarnings:");
        for diagnostic in &report.diagnostics {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

fn cmd_deps(asset: &Path, search_paths: &[PathBuf], config: PackConfig, json: bool) -> Result<()> {
    let resolver = make_resolver(asset, search_paths)?;
    let session = LayerRegistry::new();
    let discovery = Packager::new(&resolver, &session)
        .with_config(config)
        .discover(&root_asset(asset)?, None)
        .with_context(|| format!("failed to discover dependencies of {}", asset.display()))?;

    let graph = &discovery.graph;
    if json {
        let entries: Vec<serde_json::Value> = discovery
            .map
            .entries()
            .map(|(id, name)| {
                let node = graph.node(id);
                serde_json::json!({
                    "name": name,
                    "source": node.key.to_string(),
                    "layer": node.is_layer(),
                })
            })
            .collect();
        let skipped: Vec<serde_json::Value> = graph
            .skipped()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "owner": graph.node(s.owner).key.to_string(),
                    "site": s.site.to_string(),
                    "kind": s.kind,
                    "path": s.raw,
                    "reason": s.reason.to_string(),
                })
            })
            .collect();
        let out = serde_json::json!({ "entries": entries, "skipped": skipped });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} assets, {} references", graph.len(), graph.references().len());
    for (id, name) in discovery.map.entries() {
        let node = graph.node(id);
        let kind = if node.is_layer() { "layer" } else { "file" };
        println!("  {:<5} {:<40} <- {}", kind, name, node.key);
    }
    if !graph.skipped().is_empty() {
        println!("\nSkipped:");
        for s in graph.skipped() {
            println!(
                "  {} at {} in {}: {}",
                s.raw,
                s.site,
                graph.node(s.owner).key,
                s.reason
            );
        }
    }
    Ok(())
}

fn cmd_list(package: &Path) -> Result<()> {
    let reader = ArchiveReader::open(package)
        .with_context(|| format!("failed to read {}", package.display()))?;
    println!("{:>10}  {:>10}  {:>8}  name", "offset", "size", "crc32");
    for entry in reader.entries() {
        println!(
            "{:>10}  {:>10}  {:08x}  {}",
            entry.data_offset, entry.size, entry.crc32, entry.name
        );
    }
    Ok(())
}

fn cmd_verify(package: &Path, alignment: u16) -> Result<()> {
    let reader = ArchiveReader::open(package)
        .with_context(|| format!("failed to read {}", package.display()))?;
    reader
        .verify(alignment)
        .with_context(|| format!("{} failed verification", package.display()))?;

    let mut issues = 0;
    for entry in reader.entries() {
        let ext = paths::extension(&entry.name).unwrap_or_default();
        if !sdz_layer::format::is_layer_extension(ext) {
            continue;
        }
        let Some(bytes) = reader.read(&entry.name) else {
            continue;
        };
        let data = match sdz_layer::format::decode(bytes, None) {
            Ok((data, _)) => data,
            Err(e) => {
                println!("WARN: {} is not a readable layer: {}", entry.name, e);
                issues += 1;
                continue;
            }
        };
        for r in data.references() {
            let inside = paths::resolve_in_package(&entry.name, &r.path)
                .is_some_and(|target| reader.entry(&target).is_some());
            if !inside {
                println!("WARN: {} at {} in {} points outside the package", r.path, r.site, entry.name);
                issues += 1;
            }
        }
    }

    if issues > 0 {
        anyhow::bail!("{} references do not resolve inside {}", issues, package.display());
    }
    println!(
        "OK: {} entries, {}-byte aligned, checksums valid",
        reader.entries().len(),
        alignment
    );
    Ok(())
}
