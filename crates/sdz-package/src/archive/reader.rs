use super::{
    ArchiveError, CENTRAL_HEADER_LEN, CENTRAL_HEADER_SIG, END_OF_CENTRAL_DIR_LEN,
    END_OF_CENTRAL_DIR_SIG, LOCAL_HEADER_LEN, LOCAL_HEADER_SIG,
};
use serde::Serialize;
use std::path::Path;

/// One entry as found in an existing archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub name: String,
    pub header_offset: u64,
    pub data_offset: u64,
    pub size: u64,
    pub crc32: u32,
}

/// Read-only view of a package held in memory.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    data: Vec<u8>,
    entries: Vec<StoredEntry>,
}

fn u16_at(data: &[u8], at: usize) -> Result<u16, ArchiveError> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| ArchiveError::Corrupt(format!("truncated at offset {}", at)))
}

fn u32_at(data: &[u8], at: usize) -> Result<u32, ArchiveError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| ArchiveError::Corrupt(format!("truncated at offset {}", at)))
}

/// Offset of the end-of-central-directory record, searching backwards over
/// any trailing comment.
fn find_end_of_central_directory(data: &[u8]) -> Result<usize, ArchiveError> {
    let record = END_OF_CENTRAL_DIR_LEN as usize;
    if data.len() < record {
        return Err(ArchiveError::Corrupt("too short for a package".into()));
    }
    let last = data.len() - record;
    let first = last.saturating_sub(usize::from(u16::MAX));
    let sig = END_OF_CENTRAL_DIR_SIG.to_le_bytes();
    (first..=last)
        .rev()
        .find(|&i| data[i..i + 4] == sig)
        .ok_or_else(|| ArchiveError::Corrupt("end of central directory not found".into()))
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ArchiveError> {
        let eocd = find_end_of_central_directory(&data)?;
        let count = usize::from(u16_at(&data, eocd + 10)?);
        let cd_offset = u32_at(&data, eocd + 16)? as usize;

        let mut entries = Vec::with_capacity(count);
        let mut at = cd_offset;
        for _ in 0..count {
            if u32_at(&data, at)? != CENTRAL_HEADER_SIG {
                return Err(ArchiveError::Corrupt(format!("bad central header at {}", at)));
            }
            let method = u16_at(&data, at + 10)?;
            let crc32 = u32_at(&data, at + 16)?;
            let compressed = u64::from(u32_at(&data, at + 20)?);
            let size = u64::from(u32_at(&data, at + 24)?);
            let name_len = usize::from(u16_at(&data, at + 28)?);
            let extra_len = usize::from(u16_at(&data, at + 30)?);
            let comment_len = usize::from(u16_at(&data, at + 32)?);
            let header_offset = u32_at(&data, at + 42)? as usize;
            let name_start = at + CENTRAL_HEADER_LEN as usize;
            let name_bytes = data
                .get(name_start..name_start + name_len)
                .ok_or_else(|| ArchiveError::Corrupt("truncated entry name".into()))?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();

            if method != 0 {
                return Err(ArchiveError::Compressed { name, method });
            }
            if compressed != size {
                return Err(ArchiveError::Corrupt(format!("stored entry '{}' has mismatched sizes", name)));
            }
            if u32_at(&data, header_offset)? != LOCAL_HEADER_SIG {
                return Err(ArchiveError::Corrupt(format!("bad local header for '{}'", name)));
            }
            let local_name_len = usize::from(u16_at(&data, header_offset + 26)?);
            let local_extra_len = usize::from(u16_at(&data, header_offset + 28)?);
            let data_offset = (header_offset + LOCAL_HEADER_LEN as usize + local_name_len + local_extra_len) as u64;
            if data_offset + size > data.len() as u64 {
                return Err(ArchiveError::Corrupt(format!("entry '{}' runs past the end", name)));
            }

            entries.push(StoredEntry {
                name,
                header_offset: header_offset as u64,
                data_offset,
                size,
                crc32,
            });
            at = name_start + name_len + extra_len + comment_len;
        }
        Ok(Self { data, entries })
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[StoredEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entry(&self, name: &str) -> Option<&StoredEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Payload bytes of an entry, borrowed from the archive.
    pub fn read(&self, name: &str) -> Option<&[u8]> {
        let entry = self.entry(name)?;
        self.data
            .get(entry.data_offset as usize..(entry.data_offset + entry.size) as usize)
    }

    /// Check every entry's CRC-32 and payload alignment.
    pub fn verify(&self, alignment: u16) -> Result<(), ArchiveError> {
        for entry in &self.entries {
            if alignment > 1 && entry.data_offset % u64::from(alignment) != 0 {
                return Err(ArchiveError::Misaligned {
                    name: entry.name.clone(),
                    offset: entry.data_offset,
                    alignment,
                });
            }
            let bytes = self.read(&entry.name).unwrap_or_default();
            if crc32fast::hash(bytes) != entry.crc32 {
                return Err(ArchiveError::ChecksumMismatch {
                    name: entry.name.clone(),
                });
            }
        }
        Ok(())
    }
}
