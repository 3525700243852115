//! Dependency graph: an arena of discovered layers and leaf files.
//!
//! Nodes are addressed by [`NodeId`] (index into the arena) and looked up by
//! [`NodeKey`], the stable identity used as the visited set during discovery.
//! The root is always node 0.

use sdz_core::AssetId;
use sdz_layer::{Layer, ReferenceKind, ReferenceSite};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// A file reached through the resolver.
    Asset(AssetId),
    /// An in-memory layer from the caller's session.
    Anonymous(String),
}

impl NodeKey {
    pub fn asset_id(&self) -> Option<&AssetId> {
        match self {
            Self::Asset(id) => Some(id),
            Self::Anonymous(_) => None,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(id) => write!(f, "{}", id),
            Self::Anonymous(identifier) => f.write_str(identifier),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    /// A layer with the pipeline's private working copy.
    Layer(Layer),
    /// Any other file; packaged byte-for-byte.
    Leaf,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub key: NodeKey,
    pub content: NodeContent,
}

impl Node {
    pub fn layer(key: NodeKey, layer: Layer) -> Self {
        Self {
            key,
            content: NodeContent::Layer(layer),
        }
    }

    pub fn leaf(id: AssetId) -> Self {
        Self {
            key: NodeKey::Asset(id),
            content: NodeContent::Leaf,
        }
    }

    pub fn is_layer(&self) -> bool {
        matches!(self.content, NodeContent::Layer(_))
    }

    pub fn as_layer(&self) -> Option<&Layer> {
        match &self.content {
            NodeContent::Layer(layer) => Some(layer),
            NodeContent::Leaf => None,
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut Layer> {
        match &mut self.content {
            NodeContent::Layer(layer) => Some(layer),
            NodeContent::Leaf => None,
        }
    }
}

/// An edge: one reference in `owner` that resolved to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub owner: NodeId,
    pub site: ReferenceSite,
    pub kind: ReferenceKind,
    pub raw: String,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Directory,
    Unresolved(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => f.write_str("names a directory"),
            Self::Unresolved(reason) => f.write_str(reason),
        }
    }
}

/// A reference that discovery did not follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedReference {
    pub owner: NodeId,
    pub site: ReferenceSite,
    pub kind: ReferenceKind,
    pub raw: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, NodeId>,
    references: Vec<Reference>,
    targets: HashMap<(NodeId, String), NodeId>,
    skipped: Vec<SkippedReference>,
}

impl DependencyGraph {
    pub fn new(root: Node) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            references: Vec::new(),
            targets: HashMap::new(),
            skipped: Vec::new(),
        };
        graph.add_node(root);
        graph
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Node ids in discovery order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Add a node that has not been seen before. Returns the existing id if
    /// the key is already present.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.lookup(&node.key) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(node.key.clone(), id);
        self.nodes.push(node);
        id
    }

    pub fn add_reference(&mut self, reference: Reference) {
        self.targets
            .entry((reference.owner, reference.raw.clone()))
            .or_insert(reference.target);
        self.references.push(reference);
    }

    pub fn add_skipped(&mut self, skipped: SkippedReference) {
        self.skipped.push(skipped);
    }

    /// Every followed reference, in discovery order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn references_from(&self, owner: NodeId) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(move |r| r.owner == owner)
    }

    pub fn skipped(&self) -> &[SkippedReference] {
        &self.skipped
    }

    /// Node that `raw`, as written in `owner`, resolved to.
    ///
    /// Resolution depends only on the raw path and the owning layer, so this
    /// stays valid after edits that move references between sites.
    pub fn target_of(&self, owner: NodeId, raw: &str) -> Option<NodeId> {
        self.targets.get(&(owner, raw.to_string())).copied()
    }
}
