use bstr::{BStr, BString, ByteSlice};
use rgit_hash::ObjectId;
use rgit_utils::date::Signature;

use crate::ObjectError;

/// A git commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// OID of the root tree.
    pub tree: ObjectId,
    /// Parent commit OIDs (empty for a root commit).
    pub parents: Vec<ObjectId>,
    /// Author identity and timestamp.
    pub author: Signature,
    /// Committer identity and timestamp.
    pub committer: Signature,
    /// Headers this parser does not interpret, preserved in order.
    pub extra_headers: Vec<(BString, BString)>,
    /// Commit message (everything after the blank separator line).
    pub message: BString,
}

impl Commit {
    /// The committer timestamp, used to order history walks.
    pub fn commit_time(&self) -> i64 {
        self.committer.date.timestamp
    }

    /// Parse commit content from raw bytes (no object header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectId> = None;
        let mut parents = Vec::new();
        let mut author: Option<Signature> = None;
        let mut committer: Option<Signature> = None;
        let mut extra_headers: Vec<(BString, BString)> = Vec::new();

        let (headers, message) = split_headers(content);
        for (key, value) in headers {
            match key.as_slice() {
                b"tree" => tree = Some(parse_oid_value(&value)?),
                b"parent" => parents.push(parse_oid_value(&value)?),
                b"author" => author = Some(parse_signature(value.as_bstr())?),
                b"committer" => committer = Some(parse_signature(value.as_bstr())?),
                _ => extra_headers.push((key, value)),
            }
        }

        Ok(Self {
            tree: tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?,
            parents,
            author: author.ok_or(ObjectError::MissingCommitField { field: "author" })?,
            committer: committer
                .ok_or(ObjectError::MissingCommitField { field: "committer" })?,
            extra_headers,
            message,
        })
    }

    /// Serialize to canonical commit format.
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        push_header(&mut out, b"tree", self.tree.to_hex().as_bytes());
        for parent in &self.parents {
            push_header(&mut out, b"parent", parent.to_hex().as_bytes());
        }
        push_header(&mut out, b"author", &self.author.to_bytes());
        push_header(&mut out, b"committer", &self.committer.to_bytes());
        for (key, value) in &self.extra_headers {
            push_header(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

/// Split content into `(key, value)` header pairs and the message.
///
/// Continuation lines (leading space) are folded into the preceding value
/// with the space stripped, as git writes multi-line headers.
pub(crate) fn split_headers(content: &[u8]) -> (Vec<(BString, BString)>, BString) {
    let mut headers: Vec<(BString, BString)> = Vec::new();
    let mut pos = 0;

    while pos < content.len() {
        if content[pos] == b'\n' {
            pos += 1;
            break;
        }
        let line_end = content[pos..]
            .find_byte(b'\n')
            .map(|p| p + pos)
            .unwrap_or(content.len());
        let line = &content[pos..line_end];

        if line.starts_with(b" ") {
            if let Some(last) = headers.last_mut() {
                last.1.push(b'\n');
                last.1.extend_from_slice(&line[1..]);
            }
        } else if let Some(space) = line.find_byte(b' ') {
            headers.push((BString::from(&line[..space]), BString::from(&line[space + 1..])));
        } else {
            headers.push((BString::from(line), BString::new(Vec::new())));
        }
        pos = line_end + 1;
    }

    (headers, BString::from(&content[pos.min(content.len())..]))
}

pub(crate) fn push_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    // Multi-line values get continuation-line framing.
    let mut first = true;
    for line in value.split(|&b| b == b'\n') {
        if !first {
            out.push(b'\n');
            out.push(b' ');
        }
        out.extend_from_slice(line);
        first = false;
    }
    out.push(b'\n');
}

pub(crate) fn parse_oid_value(value: &[u8]) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| ObjectError::InvalidHeader("non-UTF8 OID".into()))?;
    Ok(ObjectId::from_hex(hex.trim())?)
}

pub(crate) fn parse_signature(value: &BStr) -> Result<Signature, ObjectError> {
    Signature::parse(value).map_err(|e| ObjectError::InvalidSignature(e.to_string()))
}
