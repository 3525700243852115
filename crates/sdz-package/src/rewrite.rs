//! Reference rewriting on private layer copies.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::PackageError;
use crate::graph::{DependencyGraph, NodeId};
use crate::localize::LocalizationMap;
use sdz_core::config::RewriteFailurePolicy;
use sdz_core::paths;
use sdz_layer::{Layer, LayerReference};

/// A packaged layer after rewriting, with its serialized bytes.
#[derive(Debug, Clone)]
pub struct RewrittenLayer {
    pub node: NodeId,
    pub name: String,
    pub layer: Layer,
    pub bytes: Vec<u8>,
}

/// Rewrite every named layer so its references point at package entries,
/// then serialize it.
///
/// Works on clones of the graph's working copies; neither the graph nor the
/// caller's session is modified. References without a packaged target
/// (skipped during discovery) keep their original path.
pub fn rewrite(
    graph: &DependencyGraph,
    map: &LocalizationMap,
    policy: RewriteFailurePolicy,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<RewrittenLayer>, PackageError> {
    let mut out = Vec::new();
    for (node, name) in map.entries() {
        let Some(source) = graph.node(node).as_layer() else {
            continue;
        };
        let mut layer = source.clone();
        let entry_dir = paths::parent_dir(name);
        let mut changed = 0usize;

        for reference in layer.references() {
            let Some(target_name) = graph.target_of(node, &reference.path).and_then(|t| map.name(t)) else {
                continue;
            };
            let new_path = paths::relative_path(entry_dir, target_name);
            if new_path == reference.path {
                continue;
            }
            if retarget(&mut layer, name, &reference, &new_path, policy, diagnostics)? {
                changed += 1;
            }
        }

        let bytes = layer.encode().map_err(|source| PackageError::Layer {
            layer: name.to_string(),
            source,
        })?;
        tracing::debug!("rewrote {} references in {} ({} bytes)", changed, name, bytes.len());
        out.push(RewrittenLayer {
            node,
            name: name.to_string(),
            layer,
            bytes,
        });
    }
    Ok(out)
}

/// Apply one edit, deciding per `policy` whether a failure is fatal.
///
/// Returns whether the reference was rewritten.
fn retarget(
    layer: &mut Layer,
    layer_name: &str,
    reference: &LayerReference,
    new_path: &str,
    policy: RewriteFailurePolicy,
    diagnostics: &mut Diagnostics,
) -> Result<bool, PackageError> {
    let Err(source) = layer.set_reference_path(&reference.site, new_path) else {
        return Ok(true);
    };
    let fatal = match policy {
        RewriteFailurePolicy::Strict => true,
        RewriteFailurePolicy::Arcs => reference.kind.is_composition_arc(),
        RewriteFailurePolicy::Lenient => false,
    };
    if fatal {
        return Err(PackageError::Rewrite {
            layer: layer_name.to_string(),
            site: reference.site.to_string(),
            source,
        });
    }
    diagnostics.push(
        DiagnosticKind::RewriteSkipped,
        format!(
            "{} at {} in {} keeps '{}': {}",
            reference.kind, reference.site, layer_name, reference.path, source
        ),
    );
    Ok(false)
}
