//! Uniform enumeration and editing of every external path in a layer.
//!
//! Composition arcs (sublayers, references, payloads, clips) and
//! asset-valued attributes are all reported as [`LayerReference`]s carrying
//! a [`ReferenceKind`] tag and a [`ReferenceSite`] address, so callers walk
//! and rewrite them without per-kind branching.

use crate::data::{AttrValue, LayerData, PrimBody};
use crate::path::PrimPath;
use serde::Serialize;
use std::fmt;

/// Kind of an external path mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Sublayer,
    Reference,
    Payload,
    Clip,
    /// An asset-valued attribute (texture file, audio file, ...).
    AssetField,
}

impl ReferenceKind {
    /// Composition arcs define the scene's structure; losing one makes the
    /// packaged scene compose differently.
    pub fn is_composition_arc(self) -> bool {
        !matches!(self, Self::AssetField)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sublayer => "sublayer",
            Self::Reference => "reference",
            Self::Payload => "payload",
            Self::Clip => "clip",
            Self::AssetField => "asset field",
        })
    }
}

/// A path-valued slot on a prim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimField {
    Reference(usize),
    Payload(usize),
    ClipAsset { set: String, index: usize },
    ClipManifest { set: String },
    Attribute(String),
    AttributeElement { name: String, index: usize },
}

/// Stable address of one path-valued slot in a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceSite {
    Sublayer(usize),
    Prim { path: PrimPath, field: PrimField },
}

impl fmt::Display for ReferenceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sublayer(i) => write!(f, "sublayers[{}]", i),
            Self::Prim { path, field } => {
                write!(f, "{}", path)?;
                match field {
                    PrimField::Reference(i) => write!(f, ".references[{}]", i),
                    PrimField::Payload(i) => write!(f, ".payloads[{}]", i),
                    PrimField::ClipAsset { set, index } => {
                        write!(f, ".clips[{}].asset_paths[{}]", set, index)
                    }
                    PrimField::ClipManifest { set } => write!(f, ".clips[{}].manifest", set),
                    PrimField::Attribute(name) => write!(f, ".{}", name),
                    PrimField::AttributeElement { name, index } => {
                        write!(f, ".{}[{}]", name, index)
                    }
                }
            }
        }
    }
}

/// One external path mention found in a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerReference {
    pub site: ReferenceSite,
    pub kind: ReferenceKind,
    pub path: String,
}

/// Errors from editing a path-valued slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("no sublayer at index {0}")]
    MissingSublayer(usize),
    #[error("no prim at {0}")]
    MissingPrim(String),
    #[error("{site} does not exist")]
    MissingField { site: String },
    #[error("{site} holds a {found} value, not an asset path")]
    NotAnAsset { site: String, found: &'static str },
    #[error("'{0}' cannot be stored as an asset path")]
    InvalidPath(String),
}

/// Asset paths cannot be empty or carry `@` delimiters or control characters.
pub fn is_storable_asset_path(path: &str) -> bool {
    !path.is_empty() && !path.contains('@') && !path.chars().any(char::is_control)
}

impl LayerData {
    /// Every non-empty external path in the layer, in document order,
    /// including those inside every variant of every variant set.
    pub fn references(&self) -> Vec<LayerReference> {
        let mut out = Vec::new();
        for (i, path) in self.sublayers.iter().enumerate() {
            if !path.is_empty() {
                out.push(LayerReference {
                    site: ReferenceSite::Sublayer(i),
                    kind: ReferenceKind::Sublayer,
                    path: path.clone(),
                });
            }
        }
        for prim in &self.prims {
            collect_body(&PrimPath::root(&prim.name), &prim.body, &mut out);
        }
        out
    }

    /// Replace the path stored at `site`.
    pub fn set_reference_path(&mut self, site: &ReferenceSite, new_path: &str) -> Result<(), EditError> {
        if !is_storable_asset_path(new_path) {
            return Err(EditError::InvalidPath(new_path.to_string()));
        }
        let (path, field) = match site {
            ReferenceSite::Sublayer(i) => {
                let slot = self
                    .sublayers
                    .get_mut(*i)
                    .ok_or(EditError::MissingSublayer(*i))?;
                *slot = new_path.to_string();
                return Ok(());
            }
            ReferenceSite::Prim { path, field } => (path, field),
        };
        let missing = || EditError::MissingField {
            site: site.to_string(),
        };
        let body = self
            .body_mut(path)
            .ok_or_else(|| EditError::MissingPrim(path.to_string()))?;
        let slot: &mut String = match field {
            PrimField::Reference(i) => &mut body.references.get_mut(*i).ok_or_else(missing)?.asset_path,
            PrimField::Payload(i) => &mut body.payloads.get_mut(*i).ok_or_else(missing)?.asset_path,
            PrimField::ClipAsset { set, index } => body
                .clips
                .get_mut(set)
                .and_then(|c| c.asset_paths.get_mut(*index))
                .ok_or_else(missing)?,
            PrimField::ClipManifest { set } => body
                .clips
                .get_mut(set)
                .and_then(|c| c.manifest_asset_path.as_mut())
                .ok_or_else(missing)?,
            PrimField::Attribute(name) => match body.attributes.get_mut(name) {
                Some(AttrValue::Asset(value)) => value,
                Some(other) => {
                    return Err(EditError::NotAnAsset {
                        site: site.to_string(),
                        found: other.type_name(),
                    });
                }
                None => return Err(missing()),
            },
            PrimField::AttributeElement { name, index } => match body.attributes.get_mut(name) {
                Some(AttrValue::AssetArray(values)) => values.get_mut(*index).ok_or_else(missing)?,
                Some(other) => {
                    return Err(EditError::NotAnAsset {
                        site: site.to_string(),
                        found: other.type_name(),
                    });
                }
                None => return Err(missing()),
            },
        };
        *slot = new_path.to_string();
        Ok(())
    }
}

fn collect_body(path: &PrimPath, body: &PrimBody, out: &mut Vec<LayerReference>) {
    let mut push = |field: PrimField, kind: ReferenceKind, value: &str| {
        if !value.is_empty() {
            out.push(LayerReference {
                site: ReferenceSite::Prim {
                    path: path.clone(),
                    field,
                },
                kind,
                path: value.to_string(),
            });
        }
    };

    for (i, arc) in body.references.iter().enumerate() {
        push(PrimField::Reference(i), ReferenceKind::Reference, &arc.asset_path);
    }
    for (i, arc) in body.payloads.iter().enumerate() {
        push(PrimField::Payload(i), ReferenceKind::Payload, &arc.asset_path);
    }
    for (set, clip) in &body.clips {
        for (index, asset) in clip.asset_paths.iter().enumerate() {
            push(
                PrimField::ClipAsset {
                    set: set.clone(),
                    index,
                },
                ReferenceKind::Clip,
                asset,
            );
        }
        if let Some(manifest) = &clip.manifest_asset_path {
            push(
                PrimField::ClipManifest { set: set.clone() },
                ReferenceKind::Clip,
                manifest,
            );
        }
    }
    for (name, value) in &body.attributes {
        match value {
            AttrValue::Asset(asset) => {
                push(PrimField::Attribute(name.clone()), ReferenceKind::AssetField, asset);
            }
            AttrValue::AssetArray(assets) => {
                for (index, asset) in assets.iter().enumerate() {
                    push(
                        PrimField::AttributeElement {
                            name: name.clone(),
                            index,
                        },
                        ReferenceKind::AssetField,
                        asset,
                    );
                }
            }
            _ => {}
        }
    }

    for (set, variants) in &body.variant_sets {
        for (name, variant) in variants {
            collect_body(&path.variant(set, name), variant, out);
        }
    }
    for child in &body.children {
        collect_body(&path.child(&child.name), &child.body, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClipSet, Prim};

    fn layer() -> LayerData {
        let mut prim = Prim::new("World")
            .with_reference("chair.sda")
            .with_reference("")
            .with_payload("heavy.sdc")
            .with_attribute("diffuse", AttrValue::Asset("tex/a.png".into()))
            .with_attribute(
                "frames",
                AttrValue::AssetArray(vec!["f1.png".into(), "f2.png".into()]),
            )
            .with_attribute("label", AttrValue::String("not/a/path.png".into()));
        prim.body.clips.insert(
            "anim".into(),
            ClipSet {
                asset_paths: vec!["clip1.sdc".into()],
                manifest_asset_path: Some("manifest.sda".into()),
                ..ClipSet::default()
            },
        );
        LayerData::default()
            .with_sublayer("base.sda")
            .with_prim(prim.with_variant(
                "look",
                "red",
                crate::data::PrimBody {
                    attributes: [("tint".to_string(), AttrValue::Asset("red.png".into()))]
                        .into_iter()
                        .collect(),
                    ..Default::default()
                },
            ))
    }

    #[test]
    fn test_enumerates_all_kinds() {
        let refs = layer().references();
        let paths: Vec<&str> = refs.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "base.sda",
                "chair.sda",
                "heavy.sdc",
                "clip1.sdc",
                "manifest.sda",
                "tex/a.png",
                "f1.png",
                "f2.png",
                "red.png",
            ]
        );
        assert_eq!(refs[0].kind, ReferenceKind::Sublayer);
        assert_eq!(refs[3].kind, ReferenceKind::Clip);
        assert_eq!(refs[5].kind, ReferenceKind::AssetField);
        assert_eq!(refs[8].site.to_string(), "/World{look=red}.tint");
    }

    #[test]
    fn test_set_every_reference() {
        let mut data = layer();
        for (i, r) in data.references().iter().enumerate() {
            data.set_reference_path(&r.site, &format!("new_{}", i)).unwrap();
        }
        let after: Vec<String> = data.references().into_iter().map(|r| r.path).collect();
        let expected: Vec<String> = (0..after.len()).map(|i| format!("new_{}", i)).collect();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_edit_errors() {
        let mut data = layer();
        assert_eq!(
            data.set_reference_path(&ReferenceSite::Sublayer(7), "x.sda"),
            Err(EditError::MissingSublayer(7))
        );
        let label = ReferenceSite::Prim {
            path: PrimPath::root("World"),
            field: PrimField::Attribute("label".into()),
        };
        assert!(matches!(
            data.set_reference_path(&label, "x.png"),
            Err(EditError::NotAnAsset { found: "string", .. })
        ));
        let ghost = ReferenceSite::Prim {
            path: PrimPath::root("Ghost"),
            field: PrimField::Reference(0),
        };
        assert!(matches!(
            data.set_reference_path(&ghost, "x.sda"),
            Err(EditError::MissingPrim(_))
        ));
        assert!(matches!(
            data.set_reference_path(&ReferenceSite::Sublayer(0), "bad@path"),
            Err(EditError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_arc_classification() {
        assert!(ReferenceKind::Sublayer.is_composition_arc());
        assert!(ReferenceKind::Clip.is_composition_arc());
        assert!(!ReferenceKind::AssetField.is_composition_arc());
    }
}
