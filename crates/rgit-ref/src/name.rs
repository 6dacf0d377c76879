use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::error::RefError;

/// Bytes forbidden anywhere in a ref name.
const FORBIDDEN_BYTES: &[u8] = b" ~^:?*[\\";

/// Check whether a ref name is correctly formatted.
///
/// Implements the `git-check-ref-format(1)` grammar as a pure predicate:
/// - no `/.` sequence, and no leading `.`
/// - at least one `/`
/// - no `..`
/// - only bytes >= 0x20, and none of DEL, space, `~`, `^`, `:`, `?`, `*`,
///   `[`, `\`
/// - no trailing `/` or `.`
/// - no trailing `.lock`
/// - no `@{`
pub fn check_ref_format(name: impl AsRef<[u8]>) -> bool {
    let name = name.as_ref();

    if name.find(b"/.").is_some() || name.starts_with(b".") {
        return false;
    }
    if name.find_byte(b'/').is_none() {
        return false;
    }
    if name.find(b"..").is_some() {
        return false;
    }
    for &b in name {
        if b < 0x20 || b == 0x7f || FORBIDDEN_BYTES.contains(&b) {
            return false;
        }
    }
    match name.last() {
        None | Some(b'/') | Some(b'.') => return false,
        _ => {}
    }
    if name.ends_with(b".lock") {
        return false;
    }
    if name.find(b"@{").is_some() {
        return false;
    }
    true
}

/// A reference name admitted by a container: the literal `HEAD`, or a
/// `refs/`-prefixed name whose remainder satisfies [`check_ref_format`].
///
/// `HEAD` has no `/` and so fails the plain grammar; containers still need
/// to address it, which is why admission is a separate rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(BString);

impl RefName {
    /// Create and validate a ref name.
    pub fn new(name: impl Into<BString>) -> Result<Self, RefError> {
        let name = name.into();
        if name == "HEAD"
            || (name.starts_with(b"refs/") && check_ref_format(&name[b"refs/".len()..]))
        {
            Ok(Self(name))
        } else {
            Err(RefError::InvalidName(name.to_string()))
        }
    }

    /// Create without admission checks (names already validated elsewhere,
    /// e.g. by the packed-refs codec).
    pub(crate) fn new_unchecked(name: impl Into<BString>) -> Self {
        Self(name.into())
    }

    /// The raw bytes of this name.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name as a byte string.
    pub fn as_bstr(&self) -> &BStr {
        self.0.as_bstr()
    }

    /// The name as a string slice (ref names are ASCII in practice).
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("<invalid-utf8>")
    }

    /// Consume into the inner byte string.
    pub fn into_inner(self) -> BString {
        self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<BStr> for RefName {
    fn as_ref(&self) -> &BStr {
        self.0.as_bstr()
    }
}
