//! Self-contained scene packages.
//!
//! Packaging runs strictly forward through five stages:
//!
//! 1. [`walker`] discovers every asset reachable from the root layer;
//! 2. [`localize`] gives each one a unique package-relative name;
//! 3. [`compat`] (compatibility profile only) flattens variants, enforces
//!    the format allow-list, and forces a compiled root;
//! 4. [`rewrite`] points every reference at its packaged name;
//! 5. [`archive`] writes the manifest into an aligned, stored container.
//!
//! All edits happen on private working copies. The caller's
//! [`LayerRegistry`] is read, never written, so a failed run leaves it
//! exactly as it was. Do not package against the same session from two
//! threads at once; the registry is shared state the caller owns.

pub mod archive;
pub mod compat;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod localize;
pub mod manifest;
pub mod rewrite;
pub mod walker;

pub use compat::{Converted, FormatConverter};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::PackageError;
pub use graph::{DependencyGraph, NodeId, NodeKey};
pub use localize::LocalizationMap;
pub use manifest::{EntryOrigin, ManifestEntry, PackageManifest};

use archive::{ArchiveLayout, ArchiveOptions};
use sdz_core::{PackConfig, Resolver};
use sdz_layer::LayerRegistry;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Standard,
    /// Flattened variants, allow-listed formats, compiled `.sdc` root.
    Compatibility,
}

#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Root layer: a path for the resolver or an anonymous identifier.
    pub root_asset: String,
    pub output_path: PathBuf,
    /// Name for the root entry instead of its base name.
    pub first_entry_name: Option<String>,
    pub profile: Profile,
}

impl PackageRequest {
    pub fn new(root_asset: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            root_asset: root_asset.into(),
            output_path: output_path.into(),
            first_entry_name: None,
            profile: Profile::Standard,
        }
    }

    pub fn with_first_entry_name(mut self, name: impl Into<String>) -> Self {
        self.first_entry_name = Some(name.into());
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }
}

/// Discovery and naming without rewriting.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub graph: DependencyGraph,
    pub map: LocalizationMap,
    pub diagnostics: Diagnostics,
}

/// Everything up to, but not including, the archive write.
#[derive(Debug, Clone)]
pub struct PackagePlan {
    pub graph: DependencyGraph,
    pub map: LocalizationMap,
    pub manifest: PackageManifest,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub name: String,
    pub source: String,
    pub origin: EntryOrigin,
    pub data_offset: u64,
    pub size: u64,
}

/// Summary of a completed package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub output: PathBuf,
    pub profile: Profile,
    pub entries: Vec<EntryReport>,
    pub payload_bytes: u64,
    pub archive_bytes: u64,
    pub diagnostics: Vec<Diagnostic>,
}

/// Packaging pipeline bound to a resolver and the caller's session.
pub struct Packager<'a> {
    resolver: &'a dyn Resolver,
    session: &'a LayerRegistry,
    config: PackConfig,
    converter: Option<&'a dyn FormatConverter>,
}

impl<'a> Packager<'a> {
    pub fn new(resolver: &'a dyn Resolver, session: &'a LayerRegistry) -> Self {
        Self {
            resolver,
            session,
            config: PackConfig::default(),
            converter: None,
        }
    }

    pub fn with_config(mut self, config: PackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_converter(mut self, converter: &'a dyn FormatConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Walk and name the dependencies of `root_asset`.
    pub fn discover(&self, root_asset: &str, first_entry_name: Option<&str>) -> Result<Discovery, PackageError> {
        let mut diagnostics = Diagnostics::default();
        let graph = walker::walk(
            root_asset,
            self.resolver,
            self.session,
            self.config.discovery.unresolved,
            &mut diagnostics,
        )?;
        let map = localize::localize(&graph, first_entry_name, self.config.layout.policy)?;
        Ok(Discovery {
            graph,
            map,
            diagnostics,
        })
    }

    /// Run every stage except the archive write.
    pub fn plan(&self, request: &PackageRequest) -> Result<PackagePlan, PackageError> {
        let first_entry_name = match request.profile {
            Profile::Standard => request.first_entry_name.clone(),
            Profile::Compatibility => request
                .first_entry_name
                .as_deref()
                .map(compat::root_entry_name),
        };
        let Discovery {
            mut graph,
            mut map,
            mut diagnostics,
        } = self.discover(&request.root_asset, first_entry_name.as_deref())?;

        let converted = match request.profile {
            Profile::Standard => Default::default(),
            Profile::Compatibility => {
                compat::apply(
                    &mut graph,
                    &mut map,
                    self.resolver,
                    self.converter,
                    &self.config.compat,
                    &mut diagnostics,
                )?
                .converted
            }
        };

        let rewritten = rewrite::rewrite(&graph, &map, self.config.rewrite.on_failure, &mut diagnostics)?;
        let manifest = manifest::assemble(&graph, &map, rewritten, converted, self.resolver)?;
        Ok(PackagePlan {
            graph,
            map,
            manifest,
            diagnostics,
        })
    }

    /// Build the package and write it to `request.output_path`.
    pub fn package(&self, request: &PackageRequest) -> Result<PackageReport, PackageError> {
        let plan = self.plan(request)?;
        let layout = archive::write_package(
            &plan.manifest,
            &request.output_path,
            &ArchiveOptions::from(&self.config.archive),
        )?;
        Ok(report(request, &plan, &layout))
    }
}

fn report(request: &PackageRequest, plan: &PackagePlan, layout: &ArchiveLayout) -> PackageReport {
    let entries = plan
        .manifest
        .entries()
        .iter()
        .zip(&layout.entries)
        .map(|(entry, placed)| EntryReport {
            name: entry.name.clone(),
            source: entry.source.clone(),
            origin: entry.origin,
            data_offset: placed.data_offset,
            size: placed.size,
        })
        .collect();
    PackageReport {
        output: request.output_path.clone(),
        profile: request.profile,
        entries,
        payload_bytes: plan.manifest.total_bytes(),
        archive_bytes: layout.total_size,
        diagnostics: plan.diagnostics.clone().into_vec(),
    }
}

fn run(
    session: &LayerRegistry,
    resolver: &dyn Resolver,
    request: &PackageRequest,
) -> bool {
    match Packager::new(resolver, session).package(request) {
        Ok(report) => {
            tracing::info!(
                "packaged {} into {} ({} entries, {} warnings)",
                request.root_asset,
                report.output.display(),
                report.entries.len(),
                report.diagnostics.len()
            );
            true
        }
        Err(e) => {
            tracing::error!(
                "failed to package {} into {}: {}",
                request.root_asset,
                request.output_path.display(),
                e
            );
            false
        }
    }
}

/// Package `root_asset` and everything it references into `output_path`.
///
/// Returns `false` and logs the reason on failure.
pub fn create_package(
    session: &LayerRegistry,
    resolver: &dyn Resolver,
    root_asset: &str,
    output_path: impl AsRef<Path>,
    first_entry_name: Option<&str>,
) -> bool {
    let mut request = PackageRequest::new(root_asset, output_path.as_ref());
    request.first_entry_name = first_entry_name.map(str::to_string);
    run(session, resolver, &request)
}

/// Like [`create_package`], with the compatibility profile.
pub fn create_compatibility_package(
    session: &LayerRegistry,
    resolver: &dyn Resolver,
    root_asset: &str,
    output_path: impl AsRef<Path>,
    first_entry_name: Option<&str>,
) -> bool {
    let mut request = PackageRequest::new(root_asset, output_path.as_ref())
        .with_profile(Profile::Compatibility);
    request.first_entry_name = first_entry_name.map(str::to_string);
    run(session, resolver, &request)
}
