use crate::archive::ArchiveError;
use sdz_core::ResolveError;
use sdz_layer::{EditError, LayerError};

/// Fatal packaging failures.
///
/// Non-fatal conditions never become a `PackageError`; they are recorded as
/// [`crate::diagnostics::Diagnostic`]s and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("cannot open root asset '{asset}': {reason}")]
    Resolution { asset: String, reason: String },
    #[error("unresolved dependency '{path}' at {site} in {owner}: {reason}")]
    UnresolvedDependency {
        owner: String,
        site: String,
        path: String,
        reason: String,
    },
    #[error("cannot rewrite {site} in {layer}: {source}")]
    Rewrite {
        layer: String,
        site: String,
        #[source]
        source: EditError,
    },
    #[error("'{name}' uses unsupported format '{extension}' and no converter handles it")]
    UnsupportedFormat { name: String, extension: String },
    #[error("converting '{name}' failed: {reason}")]
    Conversion { name: String, reason: String },
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("invalid package entry name '{0}'")]
    InvalidName(String),
    #[error("inconsistent package: {0}")]
    Inconsistent(String),
    #[error("cannot read {id}: {source}")]
    Fetch {
        id: String,
        #[source]
        source: ResolveError,
    },
    #[error("layer {layer}: {source}")]
    Layer {
        layer: String,
        #[source]
        source: LayerError,
    },
}
