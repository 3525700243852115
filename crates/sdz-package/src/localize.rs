//! Package-relative naming of discovered assets.

use crate::error::PackageError;
use crate::graph::{DependencyGraph, NodeId, NodeKey};
use sdz_core::config::LayoutPolicy;
use sdz_core::paths;
use sdz_layer::Layer;
use sdz_layer::format::is_layer_extension;
use std::collections::{HashMap, HashSet};

/// Unique package-relative name per packaged node, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizationMap {
    entries: Vec<(NodeId, String)>,
    by_node: HashMap<NodeId, usize>,
    taken: HashSet<String>,
}

/// Case-insensitive collision key.
fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl LocalizationMap {
    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.by_node.get(&node).map(|&i| self.entries[i].1.as_str())
    }

    pub fn root_name(&self) -> Option<&str> {
        self.name(NodeId::ROOT)
    }

    /// `(node, name)` pairs in packaging order.
    pub fn entries(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.entries.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.taken.contains(&fold(name))
    }

    /// First free name derived from `candidate`: the candidate itself, then
    /// `stem_1.ext`, `stem_2.ext`, ...
    pub fn unique_name(&self, candidate: &str) -> String {
        if !self.contains_name(candidate) {
            return candidate.to_string();
        }
        let dir = paths::parent_dir(candidate);
        let stem = paths::stem(candidate);
        let ext = paths::extension(candidate);
        (1..)
            .map(|n| {
                let file = match ext {
                    Some(ext) => format!("{}_{}.{}", stem, n, ext),
                    None => format!("{}_{}", stem, n),
                };
                paths::join(dir, &file)
            })
            .find(|name| !self.contains_name(name))
            .unwrap_or_else(|| candidate.to_string())
    }

    /// Assign `name` to a node that has none yet.
    pub fn insert(&mut self, node: NodeId, name: String) -> Result<(), PackageError> {
        if !paths::is_valid_entry_name(&name) {
            return Err(PackageError::InvalidName(name));
        }
        if self.by_node.contains_key(&node) || self.contains_name(&name) {
            return Err(PackageError::Inconsistent(format!(
                "name '{}' for node {} is already assigned",
                name, node
            )));
        }
        self.taken.insert(fold(&name));
        self.by_node.insert(node, self.entries.len());
        self.entries.push((node, name));
        Ok(())
    }

    /// Give `node` a new name, keeping its position.
    pub fn rename(&mut self, node: NodeId, name: String) -> Result<(), PackageError> {
        let index = *self
            .by_node
            .get(&node)
            .ok_or_else(|| PackageError::Inconsistent(format!("node {} has no name", node)))?;
        let old = fold(&self.entries[index].1);
        if fold(&name) == old {
            self.entries[index].1 = name;
            return Ok(());
        }
        if !paths::is_valid_entry_name(&name) {
            return Err(PackageError::InvalidName(name));
        }
        if self.contains_name(&name) {
            return Err(PackageError::Inconsistent(format!("name '{}' is already assigned", name)));
        }
        self.taken.remove(&old);
        self.taken.insert(fold(&name));
        self.entries[index].1 = name;
        Ok(())
    }

    /// Drop a non-root entry.
    pub fn remove(&mut self, node: NodeId) -> Option<String> {
        if node == NodeId::ROOT {
            return None;
        }
        let index = self.by_node.remove(&node)?;
        let (_, name) = self.entries.remove(index);
        self.taken.remove(&fold(&name));
        for (i, (id, _)) in self.entries.iter().enumerate().skip(index) {
            self.by_node.insert(*id, i);
        }
        Some(name)
    }

    /// Check the map's invariants: root present and first, names valid and
    /// pairwise distinct.
    pub fn validate(&self) -> Result<(), PackageError> {
        match self.entries.first() {
            Some((NodeId::ROOT, _)) => {}
            _ => return Err(PackageError::Inconsistent("root entry is not first".into())),
        }
        let mut seen = HashSet::new();
        for (_, name) in &self.entries {
            if !paths::is_valid_entry_name(name) {
                return Err(PackageError::InvalidName(name.clone()));
            }
            if !seen.insert(fold(name)) {
                return Err(PackageError::Inconsistent(format!("duplicate entry name '{}'", name)));
            }
        }
        Ok(())
    }
}

/// Replace characters that cannot appear in entry names or stored asset
/// paths.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '@' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let segments: Vec<&str> = cleaned
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();
    if segments.is_empty() {
        "asset".to_string()
    } else {
        segments.join("/")
    }
}

/// Original extension of the root, used to complete override names.
fn root_extension(graph: &DependencyGraph) -> String {
    match &graph.root().key {
        NodeKey::Asset(id) => id.extension().unwrap_or_else(|| "sda".to_string()),
        NodeKey::Anonymous(_) => "sda".to_string(),
    }
}

fn anonymous_name(layer: Option<&Layer>) -> String {
    let tag = layer.and_then(Layer::anonymous_tag).unwrap_or("anonymous");
    format!("{}.sda", sanitize(tag).replace('/', "_"))
}

/// Validate a caller-supplied root name and complete its extension.
fn override_name(requested: &str, graph: &DependencyGraph) -> Result<String, PackageError> {
    let trimmed = requested.trim();
    if !paths::is_valid_entry_name(trimmed) || trimmed.contains('@') {
        return Err(PackageError::InvalidName(requested.to_string()));
    }
    match paths::extension(trimmed) {
        Some(ext) if is_layer_extension(ext) => Ok(trimmed.to_string()),
        _ => Ok(format!("{}.{}", trimmed, root_extension(graph))),
    }
}

/// Candidate name for a node before collision handling.
fn candidate_name(graph: &DependencyGraph, node: NodeId, policy: LayoutPolicy, root_dir: Option<&str>) -> String {
    let n = graph.node(node);
    match &n.key {
        NodeKey::Anonymous(_) => anonymous_name(n.as_layer()),
        NodeKey::Asset(id) => {
            let preserved = match (policy, root_dir) {
                (LayoutPolicy::Preserve, Some(dir)) => id.strip_prefix(dir),
                _ => None,
            };
            sanitize(preserved.unwrap_or_else(|| id.file_name()))
        }
    }
}

/// Assign every discovered node a package-relative name, in discovery order.
///
/// Directories never reach the graph, so they never receive a name.
pub fn localize(
    graph: &DependencyGraph,
    first_entry_name: Option<&str>,
    policy: LayoutPolicy,
) -> Result<LocalizationMap, PackageError> {
    let mut map = LocalizationMap::default();
    let root_name = match first_entry_name {
        Some(requested) => override_name(requested, graph)?,
        None => candidate_name(graph, NodeId::ROOT, LayoutPolicy::Flat, None),
    };
    map.insert(NodeId::ROOT, root_name)?;

    let root_dir = graph.root().key.asset_id().map(|id| id.parent().to_string());
    for node in graph.node_ids().skip(1) {
        let candidate = candidate_name(graph, node, policy, root_dir.as_deref());
        let name = map.unique_name(&candidate);
        if name != candidate {
            tracing::debug!("name collision: {} packaged as {}", graph.node(node).key, name);
        }
        map.insert(node, name)?;
    }
    map.validate()?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use sdz_core::AssetId;
    use sdz_layer::{LayerData, LayerFormat};

    fn graph(root: &str, others: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::new(Node::layer(
            NodeKey::Asset(AssetId::new(root)),
            Layer::new(root, LayerFormat::Text, LayerData::default()),
        ));
        for other in others {
            graph.add_node(Node::leaf(AssetId::new(other)));
        }
        graph
    }

    fn names(map: &LocalizationMap) -> Vec<&str> {
        map.entries().map(|(_, n)| n).collect()
    }

    #[test]
    fn test_flat_collisions_in_discovery_order() {
        let g = graph("/s/scene.sda", &["/s/foo/tex.png", "/s/bar/tex.png", "/s/baz/TEX.png"]);
        let map = localize(&g, None, LayoutPolicy::Flat).unwrap();
        assert_eq!(names(&map), vec!["scene.sda", "tex.png", "tex_1.png", "TEX_2.png"]);
    }

    #[test]
    fn test_suffix_skips_taken_names() {
        let g = graph("/s/scene.sda", &["/s/tex_1.png", "/s/a/tex.png", "/s/b/tex.png"]);
        let map = localize(&g, None, LayoutPolicy::Flat).unwrap();
        assert_eq!(names(&map), vec!["scene.sda", "tex_1.png", "tex.png", "tex_2.png"]);
    }

    #[test]
    fn test_preserve_layout() {
        let g = graph("/s/scene.sda", &["/s/textures/a.png", "/lib/shared.png"]);
        let map = localize(&g, None, LayoutPolicy::Preserve).unwrap();
        assert_eq!(names(&map), vec!["scene.sda", "textures/a.png", "shared.png"]);
    }

    #[test]
    fn test_override_name() {
        let g = graph("/s/scene.sda", &["/s/main.sda"]);
        let map = localize(&g, Some("main"), LayoutPolicy::Flat).unwrap();
        assert_eq!(names(&map), vec!["main.sda", "main_1.sda"]);

        let map = localize(&g, Some("out.sdc"), LayoutPolicy::Flat).unwrap();
        assert_eq!(map.root_name(), Some("out.sdc"));

        let map = localize(&g, Some("top.png"), LayoutPolicy::Flat).unwrap();
        assert_eq!(map.root_name(), Some("top.png.sda"));

        for bad in ["", "../x.sda", "/abs.sda", "a@b.sda"] {
            assert!(matches!(
                localize(&g, Some(bad), LayoutPolicy::Flat),
                Err(PackageError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a:b@2x.png"), "a_b_2x.png");
        assert_eq!(sanitize("../x/./y.png"), "x/y.png");
        assert_eq!(sanitize(".."), "asset");
    }

    #[test]
    fn test_rename_and_remove() {
        let g = graph("/s/scene.sda", &["/s/a.png", "/s/b.png"]);
        let mut map = localize(&g, None, LayoutPolicy::Flat).unwrap();
        let a = NodeId::ROOT;
        assert!(map.rename(a, "b.png".into()).is_err());
        map.rename(a, "scene.sdc".into()).unwrap();
        assert!(!map.contains_name("scene.sda"));

        let first_leaf = map.entries().nth(1).map(|(id, _)| id).unwrap();
        assert_eq!(map.remove(first_leaf).as_deref(), Some("a.png"));
        assert!(map.remove(NodeId::ROOT).is_none());
        assert_eq!(names(&map), vec!["scene.sdc", "b.png"]);
        assert!(map.validate().is_ok());
    }

    #[test]
    fn test_deterministic() {
        let g = graph("/s/scene.sda", &["/s/x/t.png", "/s/y/t.png", "/s/z.wav"]);
        let a = localize(&g, None, LayoutPolicy::Flat).unwrap();
        let b = localize(&g, None, LayoutPolicy::Flat).unwrap();
        assert_eq!(a, b);
    }
}
