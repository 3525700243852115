//! Dependency discovery: breadth-first walk over layers from the root.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::PackageError;
use crate::graph::{DependencyGraph, Node, NodeId, NodeKey, Reference, SkipReason, SkippedReference};
use sdz_core::config::UnresolvedPolicy;
use sdz_core::{AssetId, AssetKind, Resolver};
use sdz_layer::format::is_layer_extension;
use sdz_layer::{LayerReference, LayerRegistry, is_anonymous_identifier};
use std::collections::VecDeque;

/// Discover every asset reachable from `root_asset`.
///
/// `root_asset` is an anonymous identifier from `session` or a path resolved
/// with no anchor. Layers are opened as working copies; the session is only
/// read.
pub fn walk(
    root_asset: &str,
    resolver: &dyn Resolver,
    session: &LayerRegistry,
    policy: UnresolvedPolicy,
    diagnostics: &mut Diagnostics,
) -> Result<DependencyGraph, PackageError> {
    let mut graph = DependencyGraph::new(open_root(root_asset, resolver, session)?);
    let mut queue = VecDeque::from([NodeId::ROOT]);

    while let Some(owner) = queue.pop_front() {
        let node = graph.node(owner);
        let anchor = node.key.asset_id().cloned();
        let references = node.as_layer().map(|l| l.references()).unwrap_or_default();
        tracing::debug!("walking {} ({} references)", node.key, references.len());

        for reference in references {
            let key = match locate(&reference.path, anchor.as_ref(), resolver) {
                Ok(key) => key,
                Err(reason) => {
                    skip(&mut graph, diagnostics, policy, owner, reference, reason)?;
                    continue;
                }
            };

            let target = match graph.lookup(&key) {
                Some(existing) => existing,
                None => match open_node(key, resolver, session) {
                    Ok(node) => {
                        let is_layer = node.is_layer();
                        let id = graph.add_node(node);
                        if is_layer {
                            queue.push_back(id);
                        }
                        id
                    }
                    Err(reason) => {
                        skip(&mut graph, diagnostics, policy, owner, reference, reason)?;
                        continue;
                    }
                },
            };

            graph.add_reference(Reference {
                owner,
                site: reference.site,
                kind: reference.kind,
                raw: reference.path,
                target,
            });
        }
    }

    tracing::info!(
        "discovered {} assets ({} skipped references)",
        graph.len(),
        graph.skipped().len()
    );
    Ok(graph)
}

fn open_root(
    root_asset: &str,
    resolver: &dyn Resolver,
    session: &LayerRegistry,
) -> Result<Node, PackageError> {
    let fail = |reason: String| PackageError::Resolution {
        asset: root_asset.to_string(),
        reason,
    };

    if is_anonymous_identifier(root_asset) {
        let layer = session
            .open_anonymous(root_asset)
            .map_err(|e| fail(e.to_string()))?;
        return Ok(Node::layer(NodeKey::Anonymous(root_asset.to_string()), layer));
    }

    let id = resolver
        .resolve(root_asset, None)
        .map_err(|e| fail(e.to_string()))?;
    match resolver.kind(&id) {
        Some(AssetKind::File) => {}
        Some(AssetKind::Directory) => return Err(fail(format!("{} is a directory", id))),
        None => return Err(fail(format!("{} does not exist", id))),
    }
    let layer = session.open(&id, resolver).map_err(|e| fail(e.to_string()))?;
    Ok(Node::layer(NodeKey::Asset(id), layer))
}

/// Map a raw reference to the identity it denotes.
fn locate(raw: &str, anchor: Option<&AssetId>, resolver: &dyn Resolver) -> Result<NodeKey, SkipReason> {
    if is_anonymous_identifier(raw) {
        return Ok(NodeKey::Anonymous(raw.to_string()));
    }
    let id = resolver
        .resolve(raw, anchor)
        .map_err(|e| SkipReason::Unresolved(e.to_string()))?;
    match resolver.kind(&id) {
        Some(AssetKind::File) => Ok(NodeKey::Asset(id)),
        Some(AssetKind::Directory) => Err(SkipReason::Directory),
        None => Err(SkipReason::Unresolved(format!("{} does not exist", id))),
    }
}

/// Build a node for a newly seen identity, opening layers as working copies.
fn open_node(key: NodeKey, resolver: &dyn Resolver, session: &LayerRegistry) -> Result<Node, SkipReason> {
    match key {
        NodeKey::Anonymous(identifier) => {
            let layer = session
                .open_anonymous(&identifier)
                .map_err(|e| SkipReason::Unresolved(e.to_string()))?;
            Ok(Node::layer(NodeKey::Anonymous(identifier), layer))
        }
        NodeKey::Asset(id) => {
            let is_layer = id.extension().is_some_and(|ext| is_layer_extension(&ext));
            if !is_layer {
                return Ok(Node::leaf(id));
            }
            let layer = session
                .open(&id, resolver)
                .map_err(|e| SkipReason::Unresolved(e.to_string()))?;
            Ok(Node::layer(NodeKey::Asset(id), layer))
        }
    }
}

fn skip(
    graph: &mut DependencyGraph,
    diagnostics: &mut Diagnostics,
    policy: UnresolvedPolicy,
    owner: NodeId,
    reference: LayerReference,
    reason: SkipReason,
) -> Result<(), PackageError> {
    let owner_key = graph.node(owner).key.to_string();
    let kind = match &reason {
        SkipReason::Directory => DiagnosticKind::DirectoryDependency,
        SkipReason::Unresolved(detail) => {
            if policy == UnresolvedPolicy::Fail {
                return Err(PackageError::UnresolvedDependency {
                    owner: owner_key,
                    site: reference.site.to_string(),
                    path: reference.path,
                    reason: detail.clone(),
                });
            }
            DiagnosticKind::UnresolvedDependency
        }
    };
    diagnostics.push(
        kind,
        format!(
            "'{}' at {} in {} {}; not packaged",
            reference.path, reference.site, owner_key, reason
        ),
    );
    graph.add_skipped(SkippedReference {
        owner,
        site: reference.site,
        kind: reference.kind,
        raw: reference.path,
        reason,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdz_core::MemoryResolver;
    use sdz_layer::format::encode;
    use sdz_layer::{AttrValue, LayerData, LayerFormat, Prim};

    fn text(data: &LayerData) -> Vec<u8> {
        encode(data, LayerFormat::Text).unwrap()
    }

    fn run(resolver: &MemoryResolver, policy: UnresolvedPolicy) -> (Result<DependencyGraph, PackageError>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let result = walk(
            "/s/scene.sda",
            resolver,
            &LayerRegistry::new(),
            policy,
            &mut diagnostics,
        );
        (result, diagnostics)
    }

    #[test]
    fn test_cycle_terminates() {
        let a = LayerData::default().with_sublayer("b.sda");
        let b = LayerData::default().with_sublayer("scene.sda");
        let resolver = MemoryResolver::new()
            .with_file("/s/scene.sda", text(&a))
            .with_file("/s/b.sda", text(&b));
        let (graph, diagnostics) = run(&resolver, UnresolvedPolicy::Warn);
        let graph = graph.unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.references().len(), 2);
        assert_eq!(graph.references()[1].target, NodeId::ROOT);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_directory_is_skipped_not_fatal() {
        let scene = LayerData::default()
            .with_prim(Prim::new("W").with_attribute("dir", AttrValue::Asset("textures".into())));
        let resolver = MemoryResolver::new()
            .with_file("/s/scene.sda", text(&scene))
            .with_file("/s/textures/a.png", b"png".to_vec());
        let (graph, diagnostics) = run(&resolver, UnresolvedPolicy::Fail);
        let graph = graph.unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.skipped()[0].reason, SkipReason::Directory);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::DirectoryDependency).count(), 1);
    }

    #[test]
    fn test_unresolved_policy() {
        let scene = LayerData::default()
            .with_prim(Prim::new("W").with_attribute("tex", AttrValue::Asset("missing.png".into())));
        let resolver = MemoryResolver::new().with_file("/s/scene.sda", text(&scene));

        let (graph, diagnostics) = run(&resolver, UnresolvedPolicy::Warn);
        assert_eq!(graph.unwrap().skipped().len(), 1);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnresolvedDependency).count(), 1);

        let (graph, _) = run(&resolver, UnresolvedPolicy::Fail);
        assert!(matches!(graph, Err(PackageError::UnresolvedDependency { .. })));
    }

    #[test]
    fn test_undecodable_layer_follows_unresolved_policy() {
        let scene = LayerData::default().with_sublayer("broken.sda");
        let resolver = MemoryResolver::new()
            .with_file("/s/scene.sda", text(&scene))
            .with_file("/s/broken.sda", b"not a layer".to_vec());
        let (graph, _) = run(&resolver, UnresolvedPolicy::Warn);
        assert_eq!(graph.unwrap().len(), 1);
        let (graph, _) = run(&resolver, UnresolvedPolicy::Fail);
        assert!(graph.is_err());
    }

    #[test]
    fn test_root_failures_are_fatal() {
        let resolver = MemoryResolver::new().with_file("/s/dir/a.png", b"x".to_vec());
        let session = LayerRegistry::new();
        let mut diagnostics = Diagnostics::default();
        for root in ["/s/none.sda", "/s/dir", "/s/dir/a.png", "anon:0:x"] {
            let err = walk(root, &resolver, &session, UnresolvedPolicy::Warn, &mut diagnostics)
                .unwrap_err();
            assert!(matches!(err, PackageError::Resolution { .. }), "{root}");
        }
    }
}
