//! Compatibility profile: flattened variants, a file-format allow-list, and
//! a compiled root layer.
//!
//! Runs after localization and before the rewrite, so the rewrite points
//! every reference at the names settled here.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::PackageError;
use crate::graph::{DependencyGraph, NodeId};
use crate::localize::LocalizationMap;
use sdz_core::config::CompatConfig;
use sdz_core::{AssetId, Resolver, paths};
use sdz_layer::LayerFormat;
use std::collections::{HashMap, HashSet, VecDeque};

/// Output of a [`FormatConverter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    /// Extension of the converted content, without the dot.
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Converts leaf files the allow-list rejects.
pub trait FormatConverter: Send + Sync {
    fn can_convert(&self, extension: &str) -> bool;

    fn convert(&self, source: &AssetId, bytes: &[u8]) -> anyhow::Result<Converted>;
}

/// What the profile changed.
#[derive(Debug, Clone, Default)]
pub struct CompatOutcome {
    /// Replacement content for converted leaves.
    pub converted: HashMap<NodeId, Vec<u8>>,
    pub variant_sets_flattened: usize,
    pub pruned: Vec<String>,
}

/// Apply the compatibility profile to the working copies and the map.
///
/// Runs before rewriting, so every reference is later pointed at the final
/// names chosen here.
pub fn apply(
    graph: &mut DependencyGraph,
    map: &mut LocalizationMap,
    resolver: &dyn Resolver,
    converter: Option<&dyn FormatConverter>,
    config: &CompatConfig,
    diagnostics: &mut Diagnostics,
) -> Result<CompatOutcome, PackageError> {
    let mut outcome = CompatOutcome {
        variant_sets_flattened: flatten_variants(graph),
        ..CompatOutcome::default()
    };
    outcome.pruned = prune_unreachable(graph, map, diagnostics);
    outcome.converted = enforce_allow_list(graph, map, resolver, converter, config, diagnostics)?;
    force_binary_root(graph, map)?;
    map.validate()?;

    tracing::info!(
        "compatibility profile: {} variant sets flattened, {} entries pruned, {} converted",
        outcome.variant_sets_flattened,
        outcome.pruned.len(),
        outcome.converted.len()
    );
    Ok(outcome)
}

fn flatten_variants(graph: &mut DependencyGraph) -> usize {
    let ids: Vec<NodeId> = graph.node_ids().collect();
    ids.into_iter()
        .filter_map(|id| graph.node_mut(id).as_layer_mut().map(|l| l.flatten_variants()))
        .sum()
}

/// Drop named entries the root no longer reaches through the (flattened)
/// working copies. Returns the dropped names.
fn prune_unreachable(
    graph: &DependencyGraph,
    map: &mut LocalizationMap,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let mut reachable = HashSet::from([NodeId::ROOT]);
    let mut queue = VecDeque::from([NodeId::ROOT]);
    while let Some(node) = queue.pop_front() {
        let Some(layer) = graph.node(node).as_layer() else {
            continue;
        };
        for reference in layer.references() {
            if let Some(target) = graph.target_of(node, &reference.path)
                && map.name(target).is_some()
                && reachable.insert(target)
            {
                queue.push_back(target);
            }
        }
    }

    let unreachable: Vec<NodeId> = map
        .entries()
        .map(|(id, _)| id)
        .filter(|id| !reachable.contains(id))
        .collect();
    let mut pruned = Vec::new();
    for id in unreachable {
        if let Some(name) = map.remove(id) {
            diagnostics.push(
                DiagnosticKind::Pruned,
                format!("{} is no longer referenced after flattening", name),
            );
            pruned.push(name);
        }
    }
    pruned
}

fn enforce_allow_list(
    graph: &mut DependencyGraph,
    map: &mut LocalizationMap,
    resolver: &dyn Resolver,
    converter: Option<&dyn FormatConverter>,
    config: &CompatConfig,
    diagnostics: &mut Diagnostics,
) -> Result<HashMap<NodeId, Vec<u8>>, PackageError> {
    let mut converted = HashMap::new();
    let entries: Vec<(NodeId, String)> = map.entries().map(|(id, n)| (id, n.to_string())).collect();

    for (node, name) in entries {
        let ext = paths::extension(&name).unwrap_or_default().to_ascii_lowercase();
        if config.allows(&ext) {
            continue;
        }

        if let Some(layer) = graph.node_mut(node).as_layer_mut() {
            // Root is handled by the forced extension below.
            if node != NodeId::ROOT {
                layer.set_format(LayerFormat::Binary);
                let new_name = map.unique_name(&paths::with_extension(&name, "sdc"));
                diagnostics.push(
                    DiagnosticKind::Converted,
                    format!("layer {} re-encoded as {}", name, new_name),
                );
                map.rename(node, new_name)?;
            }
            continue;
        }

        let id = graph
            .node(node)
            .key
            .asset_id()
            .cloned()
            .ok_or_else(|| PackageError::Inconsistent(format!("leaf {} has no asset identity", name)))?;
        let Some(converter) = converter.filter(|c| c.can_convert(&ext)) else {
            return Err(PackageError::UnsupportedFormat {
                name,
                extension: ext,
            });
        };
        let bytes = resolver.fetch(&id).map_err(|source| PackageError::Fetch {
            id: id.to_string(),
            source,
        })?;
        let result = converter
            .convert(&id, &bytes)
            .map_err(|e| PackageError::Conversion {
                name: name.clone(),
                reason: format!("{:#}", e),
            })?;
        let new_ext = result.extension.trim_start_matches('.').to_ascii_lowercase();
        if !config.allows(&new_ext) {
            return Err(PackageError::Conversion {
                name,
                reason: format!("converter produced disallowed format '{}'", new_ext),
            });
        }
        let new_name = map.unique_name(&paths::with_extension(&name, &new_ext));
        diagnostics.push(
            DiagnosticKind::Converted,
            format!("{} converted to {}", name, new_name),
        );
        map.rename(node, new_name)?;
        converted.insert(node, result.bytes);
    }
    Ok(converted)
}

/// Root entry name requested under this profile. The compiled extension
/// replaces whatever extension the caller gave.
pub(crate) fn root_entry_name(requested: &str) -> String {
    let trimmed = requested.trim();
    if paths::stem(trimmed).is_empty() {
        return requested.to_string();
    }
    paths::with_extension(trimmed, LayerFormat::Binary.extension())
}

/// The root entry always ends in `.sdc` and is written in the compiled
/// encoding, whatever name the caller asked for.
fn force_binary_root(graph: &mut DependencyGraph, map: &mut LocalizationMap) -> Result<(), PackageError> {
    let current = map
        .root_name()
        .ok_or_else(|| PackageError::Inconsistent("root has no name".into()))?
        .to_string();
    let forced = paths::with_extension(&current, LayerFormat::Binary.extension());
    if forced != current {
        let name = if forced.eq_ignore_ascii_case(&current) {
            forced
        } else {
            map.unique_name(&forced)
        };
        tracing::debug!("root entry renamed {} -> {}", current, name);
        map.rename(NodeId::ROOT, name)?;
    }
    if let Some(root) = graph.node_mut(NodeId::ROOT).as_layer_mut() {
        root.set_format(LayerFormat::Binary);
    }
    Ok(())
}
