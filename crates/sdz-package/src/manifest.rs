//! Ordered package contents.

use crate::error::PackageError;
use crate::graph::{DependencyGraph, NodeId};
use crate::localize::LocalizationMap;
use crate::rewrite::RewrittenLayer;
use rayon::prelude::*;
use sdz_core::Resolver;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Where an entry's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// A layer serialized after rewriting.
    Layer,
    /// A file copied byte-for-byte.
    File,
    /// A file produced by a format converter.
    Converted,
}

#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub name: String,
    /// Identity of the source asset or anonymous layer.
    pub source: String,
    pub origin: EntryOrigin,
    pub bytes: Vec<u8>,
}

/// Entries in archive order; the first is the root layer.
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    entries: Vec<ManifestEntry>,
}

enum Pending {
    Ready(EntryOrigin, Vec<u8>),
    Fetch(sdz_core::AssetId),
}

impl PackageManifest {
    /// Build from named entries, checking that the root is first and names
    /// are unique.
    pub fn new(entries: Vec<ManifestEntry>) -> Result<Self, PackageError> {
        if entries.is_empty() {
            return Err(PackageError::Inconsistent("manifest has no entries".into()));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.to_lowercase()) {
                return Err(PackageError::Inconsistent(format!(
                    "duplicate manifest entry '{}'",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn root(&self) -> Option<&ManifestEntry> {
        self.entries.first()
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.bytes.len() as u64).sum()
    }
}

/// Collect the bytes for every named node, in map order.
///
/// Leaf files are fetched in parallel; results keep map order.
pub fn assemble(
    graph: &DependencyGraph,
    map: &LocalizationMap,
    rewritten: Vec<RewrittenLayer>,
    mut converted: HashMap<NodeId, Vec<u8>>,
    resolver: &dyn Resolver,
) -> Result<PackageManifest, PackageError> {
    let mut layers: HashMap<NodeId, Vec<u8>> = rewritten.into_iter().map(|r| (r.node, r.bytes)).collect();

    let mut pending = Vec::with_capacity(map.len());
    for (node, name) in map.entries() {
        let key = &graph.node(node).key;
        let source = if let Some(bytes) = layers.remove(&node) {
            Pending::Ready(EntryOrigin::Layer, bytes)
        } else if let Some(bytes) = converted.remove(&node) {
            Pending::Ready(EntryOrigin::Converted, bytes)
        } else if graph.node(node).is_layer() {
            return Err(PackageError::Inconsistent(format!("layer {} was not rewritten", name)));
        } else {
            let id = key.asset_id().cloned().ok_or_else(|| {
                PackageError::Inconsistent(format!("leaf {} has no asset identity", name))
            })?;
            Pending::Fetch(id)
        };
        pending.push((name.to_string(), key.to_string(), source));
    }

    let entries = pending
        .into_par_iter()
        .map(|(name, source, pending)| {
            let (origin, bytes) = match pending {
                Pending::Ready(origin, bytes) => (origin, bytes),
                Pending::Fetch(id) => {
                    let bytes = resolver.fetch(&id).map_err(|e| PackageError::Fetch {
                        id: id.to_string(),
                        source: e,
                    })?;
                    (EntryOrigin::File, bytes)
                }
            };
            Ok(ManifestEntry {
                name,
                source,
                origin,
                bytes,
            })
        })
        .collect::<Result<Vec<_>, PackageError>>()?;

    let manifest = PackageManifest::new(entries)?;
    tracing::info!(
        "manifest: {} entries, {} bytes",
        manifest.len(),
        manifest.total_bytes()
    );
    Ok(manifest)
}
