//! Reference storage for the rgit version-control library.
//!
//! A reference maps a name like `refs/heads/master` (or `HEAD`) to either
//! an object id or another reference name. The [`RefsContainer`] trait is
//! the mapping-plus-CAS surface; [`DiskRefsContainer`] backs it with loose
//! ref files and a `packed-refs` table under a control directory, and
//! [`DictRefsContainer`] backs it with an in-memory map for tests.

mod container;
mod error;
mod files;
mod memory;
pub mod name;
pub mod packed;

pub use container::RefsContainer;
pub use error::RefError;
pub use files::DiskRefsContainer;
pub use memory::DictRefsContainer;
pub use name::{check_ref_format, RefName};
pub use packed::PackedRefs;

use bstr::{BString, ByteSlice};
use rgit_hash::ObjectId;

/// Prefix marking a symbolic reference value.
pub const SYMREF_PREFIX: &[u8] = b"ref: ";

/// The value stored in a reference slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Points directly at an object.
    Direct(ObjectId),
    /// Points at another reference.
    Symbolic(RefName),
}

impl RefValue {
    /// Decode from the textual slot contents (trailing CR/LF ignored).
    pub fn parse(contents: &[u8]) -> Result<Self, RefError> {
        let trimmed = contents.trim_end_with(|c| c == '\n' || c == '\r');
        if let Some(target) = trimmed.strip_prefix(SYMREF_PREFIX) {
            let target = std::str::from_utf8(target)
                .map_err(|_| RefError::Parse("non-UTF8 symbolic ref target".into()))?;
            Ok(Self::Symbolic(RefName::new(target)?))
        } else {
            let hex = std::str::from_utf8(trimmed)
                .map_err(|_| RefError::Parse("non-UTF8 ref contents".into()))?;
            Ok(Self::Direct(ObjectId::from_hex(hex)?))
        }
    }

    /// Encode to the on-disk form, including the trailing newline.
    pub fn to_bytes(&self) -> BString {
        match self {
            Self::Direct(id) => BString::from(format!("{}\n", id.to_hex())),
            Self::Symbolic(target) => {
                let mut out = BString::from(SYMREF_PREFIX);
                out.extend_from_slice(target.as_bytes());
                out.extend_from_slice(b"\n");
                out
            }
        }
    }

    /// The object id, when direct.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    /// The target name, when symbolic.
    pub fn as_symbolic(&self) -> Option<&RefName> {
        match self {
            Self::Symbolic(target) => Some(target),
            Self::Direct(_) => None,
        }
    }
}
