//! Layer document model.

use crate::path::{PathSegment, PrimPath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Contents of one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prim: Option<String>,
    /// Sublayer asset paths, strongest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sublayers: Vec<String>,
    /// Root prims in document order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prims: Vec<Prim>,
}

/// A named prim and its opinions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prim {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(flatten)]
    pub body: PrimBody,
}

/// Opinions held by a prim or by one variant of a variant set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimBody {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<CompositionArc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payloads: Vec<CompositionArc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,
    /// Value clip sets by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub clips: BTreeMap<String, ClipSet>,
    /// Active variant per variant set name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variant_selections: BTreeMap<String, String>,
    /// Variant set name → variant name → opinions.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variant_sets: BTreeMap<String, BTreeMap<String, PrimBody>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Prim>,
}

/// Target of a reference or payload arc.
///
/// An empty `asset_path` targets a prim in the same layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionArc {
    #[serde(default)]
    pub asset_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prim_path: Option<String>,
}

/// A value clip set: time-sampled data streamed from other layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSet {
    pub asset_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_asset_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_path: Option<String>,
    /// `(stage time, clip index)` pairs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active: Vec<[f64; 2]>,
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Asset(String),
    AssetArray(Vec<String>),
    String(String),
    Token(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Float3([f64; 3]),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Asset(_) => "asset",
            Self::AssetArray(_) => "asset[]",
            Self::String(_) => "string",
            Self::Token(_) => "token",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Float3(_) => "float3",
        }
    }
}

impl Prim {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            body: PrimBody::default(),
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_reference(mut self, asset_path: impl Into<String>) -> Self {
        self.body.references.push(CompositionArc::new(asset_path));
        self
    }

    pub fn with_payload(mut self, asset_path: impl Into<String>) -> Self {
        self.body.payloads.push(CompositionArc::new(asset_path));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.body.attributes.insert(name.into(), value);
        self
    }

    pub fn with_child(mut self, child: Prim) -> Self {
        self.body.children.push(child);
        self
    }

    pub fn with_variant(
        mut self,
        set: impl Into<String>,
        variant: impl Into<String>,
        body: PrimBody,
    ) -> Self {
        self.body
            .variant_sets
            .entry(set.into())
            .or_default()
            .insert(variant.into(), body);
        self
    }

    pub fn with_selection(mut self, set: impl Into<String>, variant: impl Into<String>) -> Self {
        self.body
            .variant_selections
            .insert(set.into(), variant.into());
        self
    }
}

impl CompositionArc {
    pub fn new(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path: None,
        }
    }
}

impl LayerData {
    pub fn with_sublayer(mut self, path: impl Into<String>) -> Self {
        self.sublayers.push(path.into());
        self
    }

    pub fn with_prim(mut self, prim: Prim) -> Self {
        self.prims.push(prim);
        self
    }

    /// Opinions at `path`, descending through children and variants.
    pub fn body(&self, path: &PrimPath) -> Option<&PrimBody> {
        let mut segments = path.segments().iter();
        let Some(PathSegment::Child(first)) = segments.next() else {
            return None;
        };
        let mut body = &self.prims.iter().find(|p| &p.name == first)?.body;
        for segment in segments {
            body = match segment {
                PathSegment::Child(name) => &body.children.iter().find(|p| &p.name == name)?.body,
                PathSegment::Variant { set, name } => body.variant_sets.get(set)?.get(name)?,
            };
        }
        Some(body)
    }

    /// Mutable opinions at `path`.
    pub fn body_mut(&mut self, path: &PrimPath) -> Option<&mut PrimBody> {
        let mut segments = path.segments().iter();
        let Some(PathSegment::Child(first)) = segments.next() else {
            return None;
        };
        let mut body = &mut self.prims.iter_mut().find(|p| &p.name == first)?.body;
        for segment in segments {
            body = match segment {
                PathSegment::Child(name) => {
                    &mut body.children.iter_mut().find(|p| &p.name == name)?.body
                }
                PathSegment::Variant { set, name } => {
                    body.variant_sets.get_mut(set)?.get_mut(name)?
                }
            };
        }
        Some(body)
    }

    /// Path of the first prim that repeats the name of an earlier sibling.
    ///
    /// Prims are addressed by name, so a layer holding such a pair cannot be
    /// edited without ambiguity.
    pub fn duplicate_prim(&self) -> Option<PrimPath> {
        fn in_siblings(prims: &[Prim], parent: Option<&PrimPath>) -> Option<PrimPath> {
            let mut seen = HashSet::new();
            for prim in prims {
                let path = match parent {
                    Some(parent) => parent.child(&prim.name),
                    None => PrimPath::root(&prim.name),
                };
                if !seen.insert(prim.name.as_str()) {
                    return Some(path);
                }
                if let Some(found) = in_body(&prim.body, &path) {
                    return Some(found);
                }
            }
            None
        }
        fn in_body(body: &PrimBody, path: &PrimPath) -> Option<PrimPath> {
            if let Some(found) = in_siblings(&body.children, Some(path)) {
                return Some(found);
            }
            body.variant_sets.iter().find_map(|(set, variants)| {
                variants
                    .iter()
                    .find_map(|(name, variant)| in_body(variant, &path.variant(set, name)))
            })
        }
        in_siblings(&self.prims, None)
    }

    /// Count variant sets anywhere in the layer.
    pub fn variant_set_count(&self) -> usize {
        fn count(body: &PrimBody) -> usize {
            body.variant_sets.len()
                + body
                    .variant_sets
                    .values()
                    .flat_map(|variants| variants.values())
                    .map(count)
                    .sum::<usize>()
                + body.children.iter().map(|c| count(&c.body)).sum::<usize>()
        }
        self.prims.iter().map(|p| count(&p.body)).sum()
    }
}
