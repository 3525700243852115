//! A single open layer: identity, encoding, and contents.

use crate::data::LayerData;
use crate::format::{self, LayerError, LayerFormat};
use crate::reference::{EditError, LayerReference, ReferenceSite};

const ANONYMOUS_PREFIX: &str = "anon:";

/// True for identifiers of in-memory layers with no backing file.
pub fn is_anonymous_identifier(identifier: &str) -> bool {
    identifier.starts_with(ANONYMOUS_PREFIX)
}

/// An open layer.
///
/// Backed layers are identified by their resolved asset path; anonymous
/// layers by an `anon:<n>:<tag>` identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    identifier: String,
    format: LayerFormat,
    pub data: LayerData,
}

impl Layer {
    pub fn new(identifier: impl Into<String>, format: LayerFormat, data: LayerData) -> Self {
        Self {
            identifier: identifier.into(),
            format,
            data,
        }
    }

    /// Decode a backed layer from its bytes.
    pub fn decode(
        identifier: impl Into<String>,
        bytes: &[u8],
        hint: Option<LayerFormat>,
    ) -> Result<Self, LayerError> {
        let (data, format) = format::decode(bytes, hint)?;
        Ok(Self::new(identifier, format, data))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_anonymous(&self) -> bool {
        is_anonymous_identifier(&self.identifier)
    }

    /// Tag of an anonymous layer (`anon:3:session` → `session`).
    pub fn anonymous_tag(&self) -> Option<&str> {
        let rest = self.identifier.strip_prefix(ANONYMOUS_PREFIX)?;
        let tag = rest.split_once(':').map_or("", |(_, tag)| tag);
        (!tag.is_empty()).then_some(tag)
    }

    pub fn format(&self) -> LayerFormat {
        self.format
    }

    pub fn set_format(&mut self, format: LayerFormat) {
        self.format = format;
    }

    pub fn references(&self) -> Vec<LayerReference> {
        self.data.references()
    }

    pub fn set_reference_path(&mut self, site: &ReferenceSite, new_path: &str) -> Result<(), EditError> {
        self.data.set_reference_path(site, new_path)
    }

    pub fn flatten_variants(&mut self) -> usize {
        self.data.flatten_variants()
    }

    /// Serialize in the layer's own encoding.
    pub fn encode(&self) -> Result<Vec<u8>, LayerError> {
        format::encode(&self.data, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_tag() {
        let layer = Layer::new("anon:2:session", LayerFormat::Text, LayerData::default());
        assert!(layer.is_anonymous());
        assert_eq!(layer.anonymous_tag(), Some("session"));

        let untagged = Layer::new("anon:2:", LayerFormat::Text, LayerData::default());
        assert_eq!(untagged.anonymous_tag(), None);

        let backed = Layer::new("/a/scene.sda", LayerFormat::Text, LayerData::default());
        assert!(!backed.is_anonymous());
        assert_eq!(backed.anonymous_tag(), None);
    }

    #[test]
    fn test_encode_uses_own_format() {
        let layer = Layer::new("/a/scene.sdc", LayerFormat::Binary, LayerData::default());
        let bytes = layer.encode().unwrap();
        let reopened = Layer::decode("/a/scene.sdc", &bytes, None).unwrap();
        assert_eq!(reopened, layer);
    }
}
