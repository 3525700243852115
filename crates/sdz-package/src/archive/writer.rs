use super::layout::{ArchiveLayout, EntryLayout, compute_layout};
use super::{
    ArchiveError, CENTRAL_HEADER_SIG, END_OF_CENTRAL_DIR_SIG, EXTRA_HEADER_LEN, LOCAL_HEADER_SIG,
    PADDING_EXTRA_ID,
};
use chrono::{DateTime, Datelike, Timelike, Utc};
use sdz_core::config::ArchiveConfig;
use std::io::{BufWriter, Write};
use std::path::Path;

const VERSION_NEEDED: u16 = 10;
const VERSION_MADE_BY: u16 = 20;
const FLAG_UTF8: u16 = 1 << 11;
/// 1980-01-01, the earliest DOS date.
const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub alignment: u16,
    /// Modification time stamped on every entry; the DOS epoch when unset.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            alignment: 64,
            timestamp: None,
        }
    }
}

impl From<&ArchiveConfig> for ArchiveOptions {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            alignment: config.alignment,
            timestamp: config.timestamp,
        }
    }
}

/// `(time, date)` in MS-DOS format.
fn dos_datetime(timestamp: Option<DateTime<Utc>>) -> (u16, u16) {
    match timestamp {
        Some(ts) if (1980..=2107).contains(&ts.year()) => {
            let date = (((ts.year() - 1980) as u16) << 9) | ((ts.month() as u16) << 5) | ts.day() as u16;
            let time = ((ts.hour() as u16) << 11) | ((ts.minute() as u16) << 5) | (ts.second() as u16 / 2);
            (time, date)
        }
        _ => (0, DOS_EPOCH_DATE),
    }
}

fn flags(name: &str) -> u16 {
    if name.is_ascii() { 0 } else { FLAG_UTF8 }
}

fn local_header(entry: &EntryLayout, time: u16, date: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(30 + entry.name.len() + usize::from(entry.extra_len));
    buf.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
    buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
    buf.extend_from_slice(&flags(&entry.name).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // stored
    buf.extend_from_slice(&time.to_le_bytes());
    buf.extend_from_slice(&date.to_le_bytes());
    buf.extend_from_slice(&entry.crc32.to_le_bytes());
    buf.extend_from_slice(&(entry.size as u32).to_le_bytes());
    buf.extend_from_slice(&(entry.size as u32).to_le_bytes());
    buf.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&entry.extra_len.to_le_bytes());
    buf.extend_from_slice(entry.name.as_bytes());
    if entry.extra_len > 0 {
        let payload = entry.extra_len - EXTRA_HEADER_LEN as u16;
        buf.extend_from_slice(&PADDING_EXTRA_ID.to_le_bytes());
        buf.extend_from_slice(&payload.to_le_bytes());
        buf.resize(buf.len() + usize::from(payload), 0);
    }
    buf
}

fn central_header(entry: &EntryLayout, time: u16, date: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(46 + entry.name.len());
    buf.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
    buf.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
    buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
    buf.extend_from_slice(&flags(&entry.name).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // stored
    buf.extend_from_slice(&time.to_le_bytes());
    buf.extend_from_slice(&date.to_le_bytes());
    buf.extend_from_slice(&entry.crc32.to_le_bytes());
    buf.extend_from_slice(&(entry.size as u32).to_le_bytes());
    buf.extend_from_slice(&(entry.size as u32).to_le_bytes());
    buf.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // extra
    buf.extend_from_slice(&0u16.to_le_bytes()); // comment
    buf.extend_from_slice(&0u16.to_le_bytes()); // disk
    buf.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
    buf.extend_from_slice(&0u32.to_le_bytes()); // external attrs
    buf.extend_from_slice(&(entry.header_offset as u32).to_le_bytes());
    buf.extend_from_slice(entry.name.as_bytes());
    buf
}

fn end_of_central_directory(layout: &ArchiveLayout) -> Vec<u8> {
    let count = layout.entries.len() as u16;
    let mut buf = Vec::with_capacity(22);
    buf.extend_from_slice(&END_OF_CENTRAL_DIR_SIG.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&(layout.central_directory_size as u32).to_le_bytes());
    buf.extend_from_slice(&(layout.central_directory_offset as u32).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf
}

/// Write `entries` to `path` in order.
///
/// The full layout is computed first. Bytes go to a temporary file in the
/// destination directory, which is synced and renamed over `path` only after
/// everything succeeded; on failure the temporary file is removed and `path`
/// is left untouched.
pub fn write_archive(
    entries: &[(&str, &[u8])],
    path: &Path,
    options: &ArchiveOptions,
) -> Result<ArchiveLayout, ArchiveError> {
    let layout = compute_layout(entries, options.alignment)?;
    let (time, date) = dos_datetime(options.timestamp);

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".sdz-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        for (entry, (_, data)) in layout.entries.iter().zip(entries) {
            out.write_all(&local_header(entry, time, date))?;
            out.write_all(data)?;
        }
        for entry in &layout.entries {
            out.write_all(&central_header(entry, time, date))?;
        }
        out.write_all(&end_of_central_directory(&layout))?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| ArchiveError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    tracing::info!(
        "wrote {} ({} entries, {} bytes)",
        path.display(),
        layout.entries.len(),
        layout.total_size
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dos_datetime() {
        assert_eq!(dos_datetime(None), (0, DOS_EPOCH_DATE));
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 42).unwrap();
        let (time, date) = dos_datetime(Some(ts));
        assert_eq!(date >> 9, 44);
        assert_eq!((date >> 5) & 0xf, 3);
        assert_eq!(date & 0x1f, 15);
        assert_eq!(time >> 11, 10);
        assert_eq!((time >> 5) & 0x3f, 30);
        assert_eq!(time & 0x1f, 21);
        let old = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(dos_datetime(Some(old)), (0, DOS_EPOCH_DATE));
    }

    #[test]
    fn test_local_header_length_matches_layout() {
        let layout = compute_layout(&[("a.sda", b"hello".as_slice())], 64).unwrap();
        let entry = &layout.entries[0];
        let header = local_header(entry, 0, DOS_EPOCH_DATE);
        assert_eq!(header.len() as u64, entry.data_offset - entry.header_offset);
        assert_eq!(entry.data_offset, 64);
    }

    #[test]
    fn test_missing_directory_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.sdz");
        let result = write_archive(&[("a.sda", b"x".as_slice())], &target, &ArchiveOptions::default());
        assert!(matches!(result, Err(ArchiveError::Io(_))));
        assert!(!target.exists());
    }
}
