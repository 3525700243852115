//! Scene-description layers for sdz packaging.
//!
//! A layer is one document of a composed scene: sublayers, a prim tree with
//! composition arcs (references, payloads, value clips), asset-valued
//! attributes, and variant sets. This crate provides the document model
//! ([`data::LayerData`]), the `.sda` text and `.sdc` compiled encodings
//! ([`format`]), uniform enumeration and editing of every external path
//! ([`reference`]), variant flattening ([`variants`]), and the caller's
//! session of open and anonymous layers ([`registry::LayerRegistry`]).

pub mod data;
pub mod format;
pub mod layer;
pub mod path;
pub mod reference;
pub mod registry;
pub mod variants;

pub use data::{AttrValue, ClipSet, CompositionArc, LayerData, Prim, PrimBody};
pub use format::{LayerError, LayerFormat};
pub use layer::{Layer, is_anonymous_identifier};
pub use path::{PathSegment, PrimPath};
pub use reference::{EditError, LayerReference, PrimField, ReferenceKind, ReferenceSite};
pub use registry::LayerRegistry;
