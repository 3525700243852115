//! Configuration for packaging runs.
//!
//! Load order: `.sdz/config.toml` → environment variables → defaults.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_DIR: &str = ".sdz";
const CONFIG_FILE: &str = "config.toml";

/// Largest accepted payload alignment.
pub const MAX_ALIGNMENT: u16 = 4096;

/// Top-level packaging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub discovery: DiscoveryConfig,
    pub layout: LayoutConfig,
    pub rewrite: RewriteConfig,
    pub archive: ArchiveConfig,
    pub compat: CompatConfig,
}

/// Dependency discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// What to do with a non-root reference that cannot be resolved.
    pub unresolved: UnresolvedPolicy,
}

/// Package entry naming settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub policy: LayoutPolicy,
}

/// Reference rewriting settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Which rewrite failures abort the run.
    pub on_failure: RewriteFailurePolicy,
}

/// Container settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Payload offset alignment in bytes. Power of two.
    pub alignment: u16,
    /// Modification time stamped on every entry. `None` writes the DOS
    /// epoch so identical inputs produce identical bytes.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Compatibility profile settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// File extensions (lowercase, no dot) a constrained reader accepts.
    pub allowed_extensions: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            alignment: 64,
            timestamp: None,
        }
    }
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["sda", "sdc", "sd", "png", "jpg", "jpeg", "m4a", "mp3", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl CompatConfig {
    pub fn allows(&self, extension: &str) -> bool {
        let ext = extension.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|a| *a == ext)
    }
}

/// Handling of unresolvable non-root references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Log a warning and leave the reference out of the package.
    #[default]
    Warn,
    /// Abort the run.
    Fail,
}

/// How package-relative names are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPolicy {
    /// Every entry at the package root under its base name.
    #[default]
    Flat,
    /// Keep the directory structure relative to the root layer for assets
    /// beneath it; everything else falls back to flat naming.
    Preserve,
}

/// Which reference rewrite failures are fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteFailurePolicy {
    /// Every failure aborts the run.
    Strict,
    /// Composition arc failures abort; asset-field failures are logged and
    /// the field keeps its original path.
    #[default]
    Arcs,
    /// Every failure is logged and the reference keeps its original path.
    Lenient,
}

macro_rules! str_enum {
    ($ty:ty, $($variant:path => $name:literal),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => anyhow::bail!(
                        "invalid value '{}' (expected one of: {})",
                        other,
                        [$($name),+].join(", ")
                    ),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($variant => $name,)+
                })
            }
        }
    };
}

str_enum!(UnresolvedPolicy, UnresolvedPolicy::Warn => "warn", UnresolvedPolicy::Fail => "fail");
str_enum!(LayoutPolicy, LayoutPolicy::Flat => "flat", LayoutPolicy::Preserve => "preserve");
str_enum!(
    RewriteFailurePolicy,
    RewriteFailurePolicy::Strict => "strict",
    RewriteFailurePolicy::Arcs => "arcs",
    RewriteFailurePolicy::Lenient => "lenient",
);

/// Path of the config file for a project root.
pub fn config_file(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var) {
        match v.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("ignoring unparsable {}={}", var, v),
        }
    }
}

impl PackConfig {
    /// Load config from `.sdz/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = config_file(project_root);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        // Environment variable overrides
        env_override("SDZ_UNRESOLVED", &mut config.discovery.unresolved);
        env_override("SDZ_LAYOUT", &mut config.layout.policy);
        env_override("SDZ_REWRITE_FAILURE", &mut config.rewrite.on_failure);
        env_override("SDZ_ALIGNMENT", &mut config.archive.alignment);

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Lowercase and strip leading dots from the allow-list.
    pub fn normalize(&mut self) {
        for ext in &mut self.compat.allowed_extensions {
            *ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        }
        self.compat.allowed_extensions.retain(|e| !e.is_empty());
        self.compat.allowed_extensions.sort();
        self.compat.allowed_extensions.dedup();
    }

    pub fn validate(&self) -> Result<()> {
        let alignment = self.archive.alignment;
        if alignment == 0 || !alignment.is_power_of_two() || alignment > MAX_ALIGNMENT {
            anyhow::bail!(
                "archive.alignment ({}) must be a power of two between 1 and {}",
                alignment,
                MAX_ALIGNMENT
            );
        }
        if self.compat.allowed_extensions.is_empty() {
            anyhow::bail!("compat.allowed_extensions must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PackConfig::default();
        assert_eq!(config.discovery.unresolved, UnresolvedPolicy::Warn);
        assert_eq!(config.layout.policy, LayoutPolicy::Flat);
        assert_eq!(config.rewrite.on_failure, RewriteFailurePolicy::Arcs);
        assert_eq!(config.archive.alignment, 64);
        assert!(config.archive.timestamp.is_none());
        assert!(config.compat.allows("png"));
        assert!(config.compat.allows("SDC"));
        assert!(!config.compat.allows("tga"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[discovery]
unresolved = "fail"

[layout]
policy = "preserve"

[archive]
alignment = 4096
"#;
        let config: PackConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.discovery.unresolved, UnresolvedPolicy::Fail);
        assert_eq!(config.layout.policy, LayoutPolicy::Preserve);
        assert_eq!(config.archive.alignment, 4096);
        // Defaults for unspecified fields
        assert_eq!(config.rewrite.on_failure, RewriteFailurePolicy::Arcs);
        assert!(config.compat.allows("wav"));
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = PackConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(config.archive.alignment, 64);
    }

    #[test]
    fn test_load_normalizes_allow_list() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".sdz");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            r#"
[compat]
allowed_extensions = [".PNG", "sdc", "sdc", " usd "]
"#,
        )
        .unwrap();

        let config = PackConfig::load(tmp.path()).unwrap();
        assert_eq!(config.compat.allowed_extensions, vec!["png", "sdc", "usd"]);
    }

    #[test]
    fn test_invalid_alignment_rejected() {
        let mut config = PackConfig::default();
        config.archive.alignment = 48;
        assert!(config.validate().is_err());
        config.archive.alignment = 0;
        assert!(config.validate().is_err());
        config.archive.alignment = 8192;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("FAIL".parse::<UnresolvedPolicy>().unwrap(), UnresolvedPolicy::Fail);
        assert_eq!(" preserve ".parse::<LayoutPolicy>().unwrap(), LayoutPolicy::Preserve);
        assert_eq!(
            "lenient".parse::<RewriteFailurePolicy>().unwrap(),
            RewriteFailurePolicy::Lenient
        );
        assert!("sometimes".parse::<UnresolvedPolicy>().is_err());
        assert_eq!(LayoutPolicy::Flat.to_string(), "flat");
    }
}
