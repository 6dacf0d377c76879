use std::fmt;
use std::str::FromStr;

use crate::HashError;

/// Number of bytes in an object digest.
pub const DIGEST_LEN: usize = 20;

/// Number of characters in the hex display form.
pub const HEX_LEN: usize = DIGEST_LEN * 2;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// A git object identifier: the 20-byte digest of an object's content.
///
/// Displayed as 40 lowercase hex characters. Binary and hex forms convert
/// exactly in both directions; uppercase input is accepted and
/// canonicalized.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; DIGEST_LEN]);

impl ObjectId {
    /// The null OID (all zeros).
    pub const NULL: Self = Self([0u8; DIGEST_LEN]);

    /// Create an ObjectId from raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != DIGEST_LEN {
            return Err(HashError::InvalidHashLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Create from an exact-size digest array (internal, infallible).
    pub(crate) fn from_raw(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an ObjectId from a 40-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let raw = hex.as_bytes();
        if raw.len() != HEX_LEN {
            return Err(HashError::InvalidHexLength {
                expected: HEX_LEN,
                actual: raw.len(),
            });
        }
        let mut digest = [0u8; DIGEST_LEN];
        for (i, byte) in digest.iter_mut().enumerate() {
            let hi = nibble(raw, 2 * i)?;
            let lo = nibble(raw, 2 * i + 1)?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(digest))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if this is the null (all-zeros) OID.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The 40-character lowercase hex form.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(HEX_LEN);
        for &byte in &self.0 {
            hex.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
            hex.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
        }
        hex
    }

    /// The loose object path component: `"xx/yyyy..."`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

/// Decode the hex digit at `pos` of a candidate hex string.
fn nibble(raw: &[u8], pos: usize) -> Result<u8, HashError> {
    match raw[pos] {
        b @ b'0'..=b'9' => Ok(b - b'0'),
        b @ b'a'..=b'f' => Ok(b - b'a' + 10),
        b @ b'A'..=b'F' => Ok(b - b'A' + 10),
        b => Err(HashError::InvalidHex {
            position: pos,
            character: char::from(b),
        }),
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
