//! The packed-refs textual format.
//!
//! ```text
//! # pack-refs with: peeled
//! <40-hex> <refname>
//! ^<40-hex>           (peeled id of the preceding line's tag)
//! ```
//!
//! Peeled (`^`) lines may only appear when the header advertises them, and
//! each must directly follow a data line.

use std::collections::BTreeMap;
use std::io::Write;

use bstr::ByteSlice;
use rgit_hash::ObjectId;

use crate::error::RefError;
use crate::name::{check_ref_format, RefName};

/// The header emitted when peeled annotations are present.
pub const PEELED_HEADER: &[u8] = b"# pack-refs with: peeled\n";

/// Split a data line into `(id, name)`.
fn split_ref_line(line: &[u8]) -> Result<(ObjectId, RefName), RefError> {
    let line_str = || String::from_utf8_lossy(line).into_owned();

    let mut fields = line.split_str(b" ");
    let (sha, name) = match (fields.next(), fields.next(), fields.next()) {
        (Some(sha), Some(name), None) => (sha, name),
        _ => {
            return Err(RefError::PackedRefs(format!(
                "invalid ref line '{}'",
                line_str()
            )))
        }
    };

    let hex = std::str::from_utf8(sha)
        .map_err(|_| RefError::PackedRefs(format!("invalid ref line '{}'", line_str())))?;
    let oid = ObjectId::from_hex(hex)
        .map_err(|e| RefError::PackedRefs(format!("invalid sha in '{}': {e}", line_str())))?;

    if !check_ref_format(name) {
        return Err(RefError::PackedRefs(format!(
            "invalid ref name '{}'",
            String::from_utf8_lossy(name)
        )));
    }

    Ok((oid, RefName::new_unchecked(name)))
}

fn parse_peeled_line(line: &[u8]) -> Result<ObjectId, RefError> {
    let hex = std::str::from_utf8(&line[1..])
        .map_err(|_| RefError::PackedRefs("invalid peeled line".into()))?;
    ObjectId::from_hex(hex.trim_end())
        .map_err(|e| RefError::PackedRefs(format!("invalid peeled sha: {e}")))
}

fn lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .filter(|l| !l.is_empty())
}

/// Read a packed-refs stream in no-peel mode.
///
/// `#` lines are skipped; any `^` line is a format error here.
pub fn read_packed_refs(data: &[u8]) -> Result<Vec<(RefName, ObjectId)>, RefError> {
    let mut refs = Vec::new();
    for line in lines(data) {
        if line[0] == b'#' {
            continue;
        }
        if line[0] == b'^' {
            return Err(RefError::PackedRefs(
                "found peeled ref in packed-refs without peeled".into(),
            ));
        }
        let (oid, name) = split_ref_line(line)?;
        refs.push((name, oid));
    }
    Ok(refs)
}

/// Read a packed-refs stream that may contain peeled annotations.
///
/// A `^` line supplies the peeled id of the preceding data line; a `^`
/// with no predecessor (or two in a row) is a format error. End of stream
/// flushes a buffered predecessor with no peeled id.
pub fn read_packed_refs_with_peeled(
    data: &[u8],
) -> Result<Vec<(RefName, ObjectId, Option<ObjectId>)>, RefError> {
    let mut refs = Vec::new();
    let mut last: Option<&[u8]> = None;

    for line in lines(data) {
        if line[0] == b'#' {
            continue;
        }
        if line[0] == b'^' {
            let pending = last.take().ok_or_else(|| {
                RefError::PackedRefs("unexpected peeled ref line".into())
            })?;
            let peeled = parse_peeled_line(line)?;
            let (oid, name) = split_ref_line(pending)?;
            refs.push((name, oid, Some(peeled)));
        } else {
            if let Some(pending) = last.replace(line) {
                let (oid, name) = split_ref_line(pending)?;
                refs.push((name, oid, None));
            }
        }
    }
    if let Some(pending) = last {
        let (oid, name) = split_ref_line(pending)?;
        refs.push((name, oid, None));
    }

    Ok(refs)
}

/// Write a packed-refs stream in ascending name order.
///
/// When `peeled` is supplied the peeled header is emitted first and each
/// annotated entry is followed by its `^` line.
pub fn write_packed_refs<W: Write>(
    out: &mut W,
    refs: &BTreeMap<RefName, ObjectId>,
    peeled: Option<&BTreeMap<RefName, ObjectId>>,
) -> std::io::Result<()> {
    if peeled.is_some() {
        out.write_all(PEELED_HEADER)?;
    }
    for (name, oid) in refs {
        out.write_all(oid.to_hex().as_bytes())?;
        out.write_all(b" ")?;
        out.write_all(name.as_bytes())?;
        out.write_all(b"\n")?;
        if let Some(peeled_id) = peeled.and_then(|p| p.get(name)) {
            out.write_all(b"^")?;
            out.write_all(peeled_id.to_hex().as_bytes())?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// A parsed packed-refs table with its peeled side-table.
///
/// The side-table is `Some` only when the file advertised peeling; absence
/// of the header makes peeled data unknowable, not merely empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedRefs {
    refs: BTreeMap<RefName, ObjectId>,
    peeled: Option<BTreeMap<RefName, ObjectId>>,
}

impl PackedRefs {
    /// An empty table with no peeled data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a packed-refs file, sniffing the first line for the peeled
    /// header to pick the parsing mode.
    pub fn parse(data: &[u8]) -> Result<Self, RefError> {
        let first_line = data.split(|&b| b == b'\n').next().unwrap_or(b"");
        let advertises_peeled =
            first_line.starts_with(b"# pack-refs") && first_line.find(b" peeled").is_some();

        if advertises_peeled {
            let mut refs = BTreeMap::new();
            let mut peeled = BTreeMap::new();
            for (name, oid, peeled_id) in read_packed_refs_with_peeled(data)? {
                if let Some(p) = peeled_id {
                    peeled.insert(name.clone(), p);
                }
                refs.insert(name, oid);
            }
            Ok(Self {
                refs,
                peeled: Some(peeled),
            })
        } else {
            let mut refs = BTreeMap::new();
            for (name, oid) in read_packed_refs(data)? {
                refs.insert(name, oid);
            }
            Ok(Self { refs, peeled: None })
        }
    }

    /// Serialize back to the textual format.
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_packed_refs(out, &self.refs, self.peeled.as_ref())
    }

    /// Look up a packed id.
    pub fn get(&self, name: &RefName) -> Option<ObjectId> {
        self.refs.get(name).copied()
    }

    /// Whether the table contains a name.
    pub fn contains(&self, name: &RefName) -> bool {
        self.refs.contains_key(name)
    }

    /// The cached peeled id for a name, when recorded.
    pub fn peeled(&self, name: &RefName) -> Option<ObjectId> {
        self.peeled.as_ref()?.get(name).copied()
    }

    /// Whether the source file advertised peeled annotations.
    pub fn has_peeled_header(&self) -> bool {
        self.peeled.is_some()
    }

    /// Remove an entry and its peeled annotation. Returns true when the
    /// entry existed.
    pub fn remove(&mut self, name: &RefName) -> bool {
        if let Some(ref mut peeled) = self.peeled {
            peeled.remove(name);
        }
        self.refs.remove(name).is_some()
    }

    /// Iterate entry names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &RefName> {
        self.refs.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
