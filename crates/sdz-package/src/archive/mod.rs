//! Aligned, uncompressed, ZIP-compatible package container.
//!
//! Entries are stored (method 0) in manifest order. Every payload starts on
//! a multiple of the configured alignment so readers can map the file and
//! use entry bytes in place. Padding goes into a local-header extra field
//! with id `0x1986`. No ZIP64: entries and offsets must fit in 32 bits.

mod layout;
mod reader;
mod writer;

pub use layout::{ArchiveLayout, EntryLayout, compute_layout};
pub use reader::{ArchiveReader, StoredEntry};
pub use writer::{ArchiveOptions, write_archive};

use crate::manifest::PackageManifest;
use std::path::Path;

pub(crate) const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
pub(crate) const LOCAL_HEADER_LEN: u64 = 30;
pub(crate) const CENTRAL_HEADER_LEN: u64 = 46;
pub(crate) const END_OF_CENTRAL_DIR_LEN: u64 = 22;
pub(crate) const PADDING_EXTRA_ID: u16 = 0x1986;
pub(crate) const EXTRA_HEADER_LEN: u64 = 4;
pub(crate) const MAX_ENTRIES: usize = u16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot finalize {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("archive has no entries")]
    Empty,
    #[error("{0} entries exceed the container limit of 65535")]
    TooManyEntries(usize),
    #[error("entry '{name}' ({size} bytes) exceeds the 4 GiB container limit")]
    EntryTooLarge { name: String, size: u64 },
    #[error("archive exceeds the 4 GiB container limit")]
    ArchiveTooLarge,
    #[error("entry name too long: '{0}'")]
    NameTooLong(String),
    #[error("duplicate entry name '{0}'")]
    DuplicateName(String),
    #[error("alignment {0} is not a power of two between 1 and 4096")]
    InvalidAlignment(u16),
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    #[error("entry '{name}' uses compression method {method}; only stored entries are supported")]
    Compressed { name: String, method: u16 },
    #[error("entry '{name}' fails its CRC-32 check")]
    ChecksumMismatch { name: String },
    #[error("entry '{name}' payload at offset {offset} is not {alignment}-byte aligned")]
    Misaligned {
        name: String,
        offset: u64,
        alignment: u16,
    },
}

/// Write a manifest as a package at `path`, atomically.
pub fn write_package(
    manifest: &PackageManifest,
    path: &Path,
    options: &ArchiveOptions,
) -> Result<ArchiveLayout, ArchiveError> {
    let entries: Vec<(&str, &[u8])> = manifest
        .entries()
        .iter()
        .map(|e| (e.name.as_str(), e.bytes.as_slice()))
        .collect();
    write_archive(&entries, path, options)
}
