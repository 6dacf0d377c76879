//! Index v2 on-disk encoding.

use std::collections::BTreeMap;
use std::io::Write;

use bstr::BString;
use rgit_hash::{Hasher, ObjectId};
use rgit_object::FileMode;
use rgit_utils::lockfile::LockFile;

use crate::{Index, IndexEntry, IndexError, StatData};

/// Magic bytes at the start of every index file.
const SIGNATURE: &[u8; 4] = b"DIRC";

/// Fixed portion of an on-disk entry: stat(40) + oid(20) + flags(2).
const ENTRY_FIXED_LEN: usize = 62;

/// Parse an index file. Only version 2 is supported.
pub(crate) fn parse_index(data: &[u8]) -> Result<BTreeMap<BString, IndexEntry>, IndexError> {
    if data.len() < 12 + 20 {
        return Err(IndexError::InvalidHeader("index file too short".into()));
    }

    let content_end = data.len() - 20;
    let expected = ObjectId::from_bytes(&data[content_end..])
        .map_err(|_| IndexError::InvalidHeader("invalid checksum".into()))?;
    let actual = Hasher::digest(&data[..content_end]);
    if expected != actual {
        return Err(IndexError::ChecksumMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }

    if &data[..4] != SIGNATURE {
        return Err(IndexError::InvalidHeader(format!(
            "bad signature: {:?}",
            &data[..4]
        )));
    }
    let version = read_u32(&data[4..]);
    if version != 2 {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let entry_count = read_u32(&data[8..]) as usize;

    let mut entries = BTreeMap::new();
    let mut cursor = 12;
    for _ in 0..entry_count {
        let (entry, next) = parse_entry(data, cursor, content_end)?;
        entries.insert(entry.path.clone(), entry);
        cursor = next;
    }

    // Anything between the entries and the checksum is extension data
    // (cache tree etc.), which this reader does not interpret.

    Ok(entries)
}

fn parse_entry(
    data: &[u8],
    offset: usize,
    content_end: usize,
) -> Result<(IndexEntry, usize), IndexError> {
    if offset + ENTRY_FIXED_LEN > content_end {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "truncated entry".into(),
        });
    }

    let d = &data[offset..];
    let stat = StatData {
        ctime_secs: read_u32(d),
        ctime_nsecs: read_u32(&d[4..]),
        mtime_secs: read_u32(&d[8..]),
        mtime_nsecs: read_u32(&d[12..]),
        dev: read_u32(&d[16..]),
        ino: read_u32(&d[20..]),
        uid: read_u32(&d[28..]),
        gid: read_u32(&d[32..]),
        size: read_u32(&d[36..]),
    };
    let mode = FileMode::from_raw(read_u32(&d[24..]));
    let oid = ObjectId::from_bytes(&d[40..60]).map_err(|_| IndexError::InvalidEntry {
        offset,
        reason: "invalid entry OID".into(),
    })?;

    let flags = u16::from_be_bytes([d[60], d[61]]);
    let name_len = (flags & 0x0fff) as usize;

    let name_start = offset + ENTRY_FIXED_LEN;
    let name_end = name_start + name_len;
    if name_end > content_end {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "entry name exceeds index bounds".into(),
        });
    }
    let path = BString::from(&data[name_start..name_end]);

    // v2 entries are NUL-padded to a multiple of 8 bytes.
    let entry_len = (ENTRY_FIXED_LEN + name_len + 8) & !7;
    let next = offset + entry_len;
    if next > content_end {
        return Err(IndexError::InvalidEntry {
            offset,
            reason: "entry padding exceeds index bounds".into(),
        });
    }

    Ok((IndexEntry { path, oid, mode, stat }, next))
}

/// Serialize and write the index atomically under its lock file.
pub(crate) fn write_index(index: &Index) -> Result<(), IndexError> {
    let data = serialize_index(index);
    let mut lock = LockFile::acquire(index.path()).map_err(|_| IndexError::LockFailed {
        path: index.path().to_path_buf(),
    })?;
    lock.write_all(&data)?;
    lock.commit().map_err(|_| IndexError::LockFailed {
        path: index.path().to_path_buf(),
    })?;
    Ok(())
}

fn serialize_index(index: &Index) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(SIGNATURE);
    buf.extend_from_slice(&2u32.to_be_bytes());
    buf.extend_from_slice(&(index.len() as u32).to_be_bytes());

    for entry in index.iter() {
        write_entry(&mut buf, entry);
    }

    let checksum = Hasher::digest(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry) {
    let entry_start = buf.len();

    buf.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.dev.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ino.to_be_bytes());
    buf.extend_from_slice(&entry.mode.raw().to_be_bytes());
    buf.extend_from_slice(&entry.stat.uid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.gid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.size.to_be_bytes());
    buf.extend_from_slice(entry.oid.as_bytes());

    let flags = entry.path.len().min(0x0fff) as u16;
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&entry.path);

    let entry_len = (ENTRY_FIXED_LEN + entry.path.len() + 8) & !7;
    let padding = entry_len - (buf.len() - entry_start);
    buf.extend(std::iter::repeat(0u8).take(padding));
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
