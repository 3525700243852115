//! Layer encodings.
//!
//! * `.sda`: text, a `#sda 1.0` header line followed by pretty JSON.
//! * `.sdc`: compiled, an 8-byte magic followed by zstd-compressed JSON.
//! * `.sd`: either; the encoding is sniffed from the content.

use crate::data::LayerData;
use sdz_core::ResolveError;
use std::io::Write;

pub const TEXT_HEADER: &str = "#sda 1.0";
pub const BINARY_MAGIC: &[u8; 8] = b"SDC\0\x01\0\0\0";
const ZSTD_LEVEL: i32 = 3;

/// Extensions the composition engine opens as layers.
pub const LAYER_EXTENSIONS: &[&str] = &["sda", "sdc", "sd"];

/// Concrete layer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerFormat {
    Text,
    Binary,
}

/// Errors from opening, decoding, or encoding layers.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("unrecognized layer encoding")]
    UnknownEncoding,
    #[error("malformed layer document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("layer compression failed: {0}")]
    Compression(#[from] std::io::Error),
    #[error("'{0}' is not a layer format")]
    NotALayer(String),
    #[error("anonymous layer '{0}' is not in this session")]
    UnknownAnonymous(String),
    #[error("duplicate sibling prim '{0}'")]
    DuplicatePrim(String),
    #[error("cannot read layer {id}: {source}")]
    Resolve {
        id: String,
        #[source]
        source: ResolveError,
    },
}

/// True if files with this extension are layers.
pub fn is_layer_extension(ext: &str) -> bool {
    LAYER_EXTENSIONS
        .iter()
        .any(|e| e.eq_ignore_ascii_case(ext))
}

impl LayerFormat {
    /// Encoding implied by an extension; `None` for `.sd` and non-layers.
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "sda" => Some(Self::Text),
            "sdc" => Some(Self::Binary),
            _ => None,
        }
    }

    /// Canonical extension of the encoding.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "sda",
            Self::Binary => "sdc",
        }
    }

    /// Detect the encoding from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(BINARY_MAGIC) {
            Some(Self::Binary)
        } else if bytes.starts_with(TEXT_HEADER.as_bytes()) {
            Some(Self::Text)
        } else {
            None
        }
    }
}

/// Reject contents whose prims cannot be addressed unambiguously.
pub fn validate(data: &LayerData) -> Result<(), LayerError> {
    match data.duplicate_prim() {
        Some(path) => Err(LayerError::DuplicatePrim(path.to_string())),
        None => Ok(()),
    }
}

/// Serialize layer contents in the given encoding.
pub fn encode(data: &LayerData, format: LayerFormat) -> Result<Vec<u8>, LayerError> {
    match format {
        LayerFormat::Text => {
            let mut out = Vec::new();
            writeln!(out, "{}", TEXT_HEADER)?;
            serde_json::to_writer_pretty(&mut out, data)?;
            out.push(b'\n');
            Ok(out)
        }
        LayerFormat::Binary => {
            let json = serde_json::to_vec(data)?;
            let mut out = BINARY_MAGIC.to_vec();
            out.extend(zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?);
            Ok(out)
        }
    }
}

/// Decode layer contents, returning the encoding actually found.
///
/// The sniffed encoding wins over `hint`, so a compiled layer saved under a
/// text extension still opens.
pub fn decode(bytes: &[u8], hint: Option<LayerFormat>) -> Result<(LayerData, LayerFormat), LayerError> {
    let format = LayerFormat::sniff(bytes).ok_or(LayerError::UnknownEncoding)?;
    if let Some(hint) = hint
        && hint != format
    {
        tracing::debug!("layer encoded as {:?} despite {:?} extension", format, hint);
    }
    let data = match format {
        LayerFormat::Text => serde_json::from_slice(&bytes[TEXT_HEADER.len()..])?,
        LayerFormat::Binary => {
            let json = zstd::decode_all(&bytes[BINARY_MAGIC.len()..])?;
            serde_json::from_slice(&json)?
        }
    };
    validate(&data)?;
    Ok((data, format))
}
