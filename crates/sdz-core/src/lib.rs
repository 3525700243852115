//! Core types for sdz scene packaging.
//!
//! Provides resolved asset identities ([`asset::AssetId`]), package-path
//! helpers, the [`resolver::Resolver`] capability with filesystem and
//! in-memory implementations, and TOML/env configuration.

pub mod asset;
pub mod config;
pub mod paths;
pub mod resolver;

pub use asset::AssetId;
pub use config::PackConfig;
pub use resolver::{AssetKind, FsResolver, MemoryResolver, ResolveError, Resolver};
