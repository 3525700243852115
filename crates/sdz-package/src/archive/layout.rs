use super::{
    ArchiveError, CENTRAL_HEADER_LEN, END_OF_CENTRAL_DIR_LEN, EXTRA_HEADER_LEN, LOCAL_HEADER_LEN,
    MAX_ENTRIES,
};
use sdz_core::config::MAX_ALIGNMENT;
use serde::Serialize;
use std::collections::HashSet;

/// Placement of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryLayout {
    pub name: String,
    pub header_offset: u64,
    /// Length of the padding extra field (header included), 0 when none.
    pub extra_len: u16,
    pub data_offset: u64,
    pub size: u64,
    pub crc32: u32,
}

/// Byte layout of a whole archive, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveLayout {
    pub alignment: u16,
    pub entries: Vec<EntryLayout>,
    pub central_directory_offset: u64,
    pub central_directory_size: u64,
    pub total_size: u64,
}

/// Extra-field length that moves a payload starting at `unpadded` onto an
/// `alignment` boundary. Any non-empty extra field needs its 4-byte header.
fn padding_extra_len(unpadded: u64, alignment: u64) -> u64 {
    let mut extra = (alignment - unpadded % alignment) % alignment;
    if extra == 0 {
        return 0;
    }
    while extra < EXTRA_HEADER_LEN {
        extra += alignment;
    }
    extra
}

/// Compute offsets, padding, and checksums for `entries` in order.
pub fn compute_layout(entries: &[(&str, &[u8])], alignment: u16) -> Result<ArchiveLayout, ArchiveError> {
    if alignment == 0 || !alignment.is_power_of_two() || alignment > MAX_ALIGNMENT {
        return Err(ArchiveError::InvalidAlignment(alignment));
    }
    if entries.is_empty() {
        return Err(ArchiveError::Empty);
    }
    if entries.len() > MAX_ENTRIES {
        return Err(ArchiveError::TooManyEntries(entries.len()));
    }

    let limit = u64::from(u32::MAX);
    let mut seen = HashSet::new();
    let mut offset = 0u64;
    let mut out = Vec::with_capacity(entries.len());
    let mut central_size = 0u64;

    for (name, data) in entries {
        if name.len() > usize::from(u16::MAX) {
            return Err(ArchiveError::NameTooLong((*name).to_string()));
        }
        if !seen.insert(*name) {
            return Err(ArchiveError::DuplicateName((*name).to_string()));
        }
        let size = data.len() as u64;
        if size >= limit {
            return Err(ArchiveError::EntryTooLarge {
                name: (*name).to_string(),
                size,
            });
        }
        if offset > limit {
            return Err(ArchiveError::ArchiveTooLarge);
        }

        let unpadded = offset + LOCAL_HEADER_LEN + name.len() as u64;
        let extra_len = padding_extra_len(unpadded, u64::from(alignment));
        let data_offset = unpadded + extra_len;
        out.push(EntryLayout {
            name: (*name).to_string(),
            header_offset: offset,
            extra_len: extra_len as u16,
            data_offset,
            size,
            crc32: crc32fast::hash(data),
        });
        offset = data_offset + size;
        central_size += CENTRAL_HEADER_LEN + name.len() as u64;
    }

    let total_size = offset + central_size + END_OF_CENTRAL_DIR_LEN;
    if offset > limit || central_size > limit || total_size > limit {
        return Err(ArchiveError::ArchiveTooLarge);
    }
    Ok(ArchiveLayout {
        alignment,
        entries: out,
        central_directory_offset: offset,
        central_directory_size: central_size,
        total_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_extra_len() {
        assert_eq!(padding_extra_len(64, 64), 0);
        assert_eq!(padding_extra_len(60, 64), 4);
        assert_eq!(padding_extra_len(62, 64), 66);
        assert_eq!(padding_extra_len(40, 64), 24);
        assert_eq!(padding_extra_len(7, 2), 5);
        assert_eq!(padding_extra_len(7, 1), 0);
    }

    #[test]
    fn test_every_payload_aligned() {
        let blobs: Vec<Vec<u8>> = (0..20).map(|i| vec![7u8; i * 13 + 1]).collect();
        let names: Vec<String> = (0..20).map(|i| format!("dir/entry_{}.bin", i)).collect();
        let entries: Vec<(&str, &[u8])> = names
            .iter()
            .zip(&blobs)
            .map(|(n, b)| (n.as_str(), b.as_slice()))
            .collect();
        for alignment in [1u16, 4, 64, 4096] {
            let layout = compute_layout(&entries, alignment).unwrap();
            for e in &layout.entries {
                assert_eq!(e.data_offset % u64::from(alignment), 0);
                assert!(e.extra_len == 0 || u64::from(e.extra_len) >= EXTRA_HEADER_LEN);
            }
            let last = layout.entries.last().unwrap();
            assert_eq!(layout.central_directory_offset, last.data_offset + last.size);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let data: &[u8] = b"x";
        assert!(matches!(compute_layout(&[], 64), Err(ArchiveError::Empty)));
        assert!(matches!(
            compute_layout(&[("a", data)], 48),
            Err(ArchiveError::InvalidAlignment(48))
        ));
        assert!(matches!(
            compute_layout(&[("a", data), ("a", data)], 64),
            Err(ArchiveError::DuplicateName(_))
        ));
    }
}
