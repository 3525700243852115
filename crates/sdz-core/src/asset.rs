//! Resolved asset identities.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved, absolute asset identity.
///
/// Always stored normalized with forward slashes, so two identities compare
/// equal exactly when they name the same asset for the resolver that
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(paths::normalize(path.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base name (final path component).
    pub fn file_name(&self) -> &str {
        paths::file_name(&self.0)
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        paths::extension(&self.0).map(str::to_ascii_lowercase)
    }

    /// Directory containing this asset.
    pub fn parent(&self) -> &str {
        paths::parent_dir(&self.0)
    }

    /// Path of this asset relative to `dir`, when it lives beneath it.
    pub fn strip_prefix(&self, dir: &str) -> Option<&str> {
        let dir = dir.trim_end_matches('/');
        let rest = self.0.strip_prefix(dir)?;
        let rest = rest.strip_prefix('/')?;
        (!rest.is_empty()).then_some(rest)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
