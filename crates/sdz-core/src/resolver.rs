//! Asset resolution: turn a reference string into a fetchable identity.
//!
//! The resolver is an explicit capability passed into packaging, never
//! ambient process state. [`FsResolver`] resolves against the filesystem;
//! [`MemoryResolver`] serves assets from an in-memory table.

use crate::asset::AssetId;
use crate::paths;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// What a resolved identity denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    File,
    Directory,
}

/// Errors from resolving or fetching assets.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("empty asset path")]
    Empty,
    #[error("asset '{0}' not found")]
    NotFound(String),
    #[error("'{0}' is a directory")]
    IsDirectory(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Resolution capability consumed by the packaging pipeline.
pub trait Resolver: Send + Sync {
    /// Resolve `raw` as written in the layer identified by `anchor`.
    ///
    /// `anchor` is `None` for the root asset and for references written in
    /// anonymous layers; those resolve against the resolver's context.
    fn resolve(&self, raw: &str, anchor: Option<&AssetId>) -> Result<AssetId, ResolveError>;

    /// Classify an identity, or `None` when nothing exists there.
    fn kind(&self, id: &AssetId) -> Option<AssetKind>;

    /// Read the full contents of a file identity.
    fn fetch(&self, id: &AssetId) -> Result<Vec<u8>, ResolveError>;
}

/// Candidate identities for `raw`, in lookup order.
///
/// Absolute paths are taken as-is. `./` and `../` paths are anchored only.
/// Other relative paths try the anchor's directory, then each search path.
fn candidates(raw: &str, anchor: Option<&AssetId>, search_paths: &[String]) -> Vec<String> {
    if paths::is_absolute(raw) {
        return vec![paths::normalize(raw)];
    }
    let anchored_only = raw.starts_with("./") || raw.starts_with("../");
    let mut out = Vec::new();
    match anchor {
        Some(anchor) => {
            out.push(paths::normalize(&paths::join(anchor.parent(), raw)));
            if !anchored_only {
                out.extend(
                    search_paths
                        .iter()
                        .map(|dir| paths::normalize(&paths::join(dir, raw))),
                );
            }
        }
        None => out.extend(
            search_paths
                .iter()
                .map(|dir| paths::normalize(&paths::join(dir, raw))),
        ),
    }
    out.dedup();
    out
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Resolves assets on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    search_paths: Vec<String>,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default context for an asset: its own directory is the first search
    /// path, so the root and anonymous layers resolve next to it.
    pub fn for_asset(asset_path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = asset_path.as_ref();
        let absolute = std::path::absolute(path).map_err(|source| ResolveError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        Ok(Self::new().with_search_path(dir))
    }

    /// Append a directory to the search path list.
    pub fn with_search_path(mut self, dir: impl AsRef<Path>) -> Self {
        self.search_paths
            .push(paths::normalize(&dir.as_ref().to_string_lossy()));
        self
    }

    pub fn search_paths(&self) -> &[String] {
        &self.search_paths
    }
}

impl Resolver for FsResolver {
    fn resolve(&self, raw: &str, anchor: Option<&AssetId>) -> Result<AssetId, ResolveError> {
        if raw.is_empty() {
            return Err(ResolveError::Empty);
        }
        let raw = if anchor.is_none() && !paths::is_absolute(raw) && self.search_paths.is_empty() {
            // No context: fall back to the working directory.
            std::path::absolute(raw)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| raw.to_string())
        } else {
            raw.to_string()
        };
        for candidate in candidates(&raw, anchor, &self.search_paths) {
            if Path::new(&candidate).exists() {
                tracing::trace!("resolved '{}' -> {}", raw, candidate);
                return Ok(AssetId::new(candidate));
            }
        }
        Err(ResolveError::NotFound(raw))
    }

    fn kind(&self, id: &AssetId) -> Option<AssetKind> {
        let meta = std::fs::metadata(id.as_str()).ok()?;
        if meta.is_dir() {
            Some(AssetKind::Directory)
        } else {
            Some(AssetKind::File)
        }
    }

    fn fetch(&self, id: &AssetId) -> Result<Vec<u8>, ResolveError> {
        if self.kind(id) == Some(AssetKind::Directory) {
            return Err(ResolveError::IsDirectory(id.to_string()));
        }
        std::fs::read(id.as_str()).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResolveError::NotFound(id.to_string())
            } else {
                ResolveError::Io {
                    path: id.to_string(),
                    source,
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Serves assets from an in-memory table keyed by absolute path.
///
/// Directories are explicit entries or implied by any file beneath them.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
    search_paths: Vec<String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert_file(path, bytes);
        self
    }

    pub fn with_directory(mut self, path: &str) -> Self {
        self.directories.insert(paths::normalize(path));
        self
    }

    pub fn with_search_path(mut self, dir: &str) -> Self {
        self.search_paths.push(paths::normalize(dir));
        self
    }

    pub fn insert_file(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert(paths::normalize(path), bytes.into());
    }

    pub fn remove_file(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(&paths::normalize(path))
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, raw: &str, anchor: Option<&AssetId>) -> Result<AssetId, ResolveError> {
        if raw.is_empty() {
            return Err(ResolveError::Empty);
        }
        candidates(raw, anchor, &self.search_paths)
            .into_iter()
            .map(AssetId::new)
            .find(|id| self.kind(id).is_some())
            .ok_or_else(|| ResolveError::NotFound(raw.to_string()))
    }

    fn kind(&self, id: &AssetId) -> Option<AssetKind> {
        let key = id.as_str();
        if self.files.contains_key(key) {
            return Some(AssetKind::File);
        }
        let prefix = format!("{}/", key.trim_end_matches('/'));
        if self.directories.contains(key)
            || self
                .files
                .range(prefix.clone()..)
                .next()
                .is_some_and(|(k, _)| k.starts_with(&prefix))
        {
            return Some(AssetKind::Directory);
        }
        None
    }

    fn fetch(&self, id: &AssetId) -> Result<Vec<u8>, ResolveError> {
        match self.files.get(id.as_str()) {
            Some(bytes) => Ok(bytes.clone()),
            None if self.kind(id) == Some(AssetKind::Directory) => {
                Err(ResolveError::IsDirectory(id.to_string()))
            }
            None => Err(ResolveError::NotFound(id.to_string())),
        }
    }
}
