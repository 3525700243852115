//! Side channel for non-fatal conditions.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A reference named a directory; it is never packaged.
    DirectoryDependency,
    /// A reference could not be resolved and was left out.
    UnresolvedDependency,
    /// A reference could not be rewritten and keeps its original path.
    RewriteSkipped,
    /// An entry became unreachable and was dropped.
    Pruned,
    /// An entry was converted or re-encoded to satisfy the format allow-list.
    Converted,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DirectoryDependency => "directory dependency",
            Self::UnresolvedDependency => "unresolved dependency",
            Self::RewriteSkipped => "rewrite skipped",
            Self::Pruned => "pruned",
            Self::Converted => "converted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Diagnostics collected over one run, in the order they occurred.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record a condition and log it.
    pub fn push(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            DiagnosticKind::Pruned | DiagnosticKind::Converted => {
                tracing::info!("{}: {}", kind, message);
            }
            _ => tracing::warn!("{}: {}", kind, message),
        }
        self.entries.push(Diagnostic { kind, message });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
