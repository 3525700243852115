//! The caller's composition session: layers already open in memory.
//!
//! Packaging reads from the registry but never writes back. [`open`] and
//! [`open_anonymous`] hand out clones, so edits made while packaging stay
//! local to the working copy.
//!
//! [`open`]: LayerRegistry::open
//! [`open_anonymous`]: LayerRegistry::open_anonymous

use crate::data::LayerData;
use crate::format::{self, LayerError, LayerFormat, is_layer_extension};
use crate::layer::{Layer, is_anonymous_identifier};
use sdz_core::{AssetId, Resolver};
use std::collections::BTreeMap;

/// Open layers keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: BTreeMap<String, Layer>,
    next_anonymous: u64,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a layer under its identifier.
    pub fn insert(&mut self, layer: Layer) -> Result<(), LayerError> {
        format::validate(&layer.data)?;
        self.layers.insert(layer.identifier().to_string(), layer);
        Ok(())
    }

    /// Create an in-memory layer with no backing file and return its
    /// identifier.
    pub fn create_anonymous(&mut self, tag: &str, data: LayerData) -> Result<String, LayerError> {
        format::validate(&data)?;
        let identifier = format!("anon:{}:{}", self.next_anonymous, tag);
        self.next_anonymous += 1;
        self.layers
            .insert(identifier.clone(), Layer::new(identifier.clone(), LayerFormat::Text, data));
        Ok(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<&Layer> {
        self.layers.get(identifier)
    }

    /// Edit a layer in place. [`open`](Self::open) re-checks the result.
    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut Layer> {
        self.layers.get_mut(identifier)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Working copy of a backed layer.
    ///
    /// A layer already open in the session wins over the bytes on disk, so
    /// unsaved edits are what gets packaged.
    pub fn open(&self, id: &AssetId, resolver: &dyn Resolver) -> Result<Layer, LayerError> {
        if let Some(layer) = self.layers.get(id.as_str()) {
            format::validate(&layer.data)?;
            return Ok(layer.clone());
        }
        let ext = id.extension().unwrap_or_default();
        if !is_layer_extension(&ext) {
            return Err(LayerError::NotALayer(id.to_string()));
        }
        let bytes = resolver.fetch(id).map_err(|source| LayerError::Resolve {
            id: id.to_string(),
            source,
        })?;
        tracing::debug!("opened layer {} ({} bytes)", id, bytes.len());
        Layer::decode(id.as_str(), &bytes, LayerFormat::for_extension(&ext))
    }

    /// Working copy of an anonymous layer.
    pub fn open_anonymous(&self, identifier: &str) -> Result<Layer, LayerError> {
        if !is_anonymous_identifier(identifier) {
            return Err(LayerError::UnknownAnonymous(identifier.to_string()));
        }
        let layer = self
            .layers
            .get(identifier)
            .ok_or_else(|| LayerError::UnknownAnonymous(identifier.to_string()))?;
        format::validate(&layer.data)?;
        Ok(layer.clone())
    }
}
