//! Prim paths that may step through variant selections.

use std::fmt;
use std::str::FromStr;

/// One step of a [`PrimPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Descend into a child prim (or a root prim for the first segment).
    Child(String),
    /// Descend into one variant of a variant set on the current prim.
    Variant { set: String, name: String },
}

/// Address of a prim's opinions inside one layer.
///
/// Rendered like `/World/Geom{look=red}/Mat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimPath {
    segments: Vec<PathSegment>,
}

impl PrimPath {
    /// Path of a root prim.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Child(name.into())],
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Child(name.into()));
        Self { segments }
    }

    pub fn variant(&self, set: impl Into<String>, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Variant {
            set: set.into(),
            name: name.into(),
        });
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when any segment selects a variant.
    pub fn is_inside_variant(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Variant { .. }))
    }
}

impl fmt::Display for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                PathSegment::Child(name) => write!(f, "/{}", name)?,
                PathSegment::Variant { set, name } => write!(f, "{{{}={}}}", set, name)?,
            }
        }
        Ok(())
    }
}

/// Errors from parsing a textual prim path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid prim path '{0}'")]
pub struct PrimPathParseError(pub String);

impl FromStr for PrimPath {
    type Err = PrimPathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PrimPathParseError(s.to_string());
        let rest = s.strip_prefix('/').ok_or_else(err)?;
        if rest.is_empty() {
            return Ok(Self::default());
        }

        let mut segments = Vec::new();
        for part in rest.split('/') {
            let (name, mut selections) = match part.find('{') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(err());
            }
            segments.push(PathSegment::Child(name.to_string()));
            while !selections.is_empty() {
                let inner = selections.strip_prefix('{').ok_or_else(err)?;
                let close = inner.find('}').ok_or_else(err)?;
                let (set, variant) = inner[..close].split_once('=').ok_or_else(err)?;
                if set.is_empty() || variant.is_empty() {
                    return Err(err());
                }
                segments.push(PathSegment::Variant {
                    set: set.to_string(),
                    name: variant.to_string(),
                });
                selections = &inner[close + 1..];
            }
        }
        Ok(Self { segments })
    }
}
