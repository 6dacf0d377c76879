use bstr::{BStr, BString, ByteSlice};
use chrono::Local;

use crate::error::UtilError;
use crate::Result;

/// A git timestamp: seconds since the Unix epoch plus a timezone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitDate {
    /// Seconds since Unix epoch.
    pub timestamp: i64,
    /// Timezone offset in minutes from UTC (e.g. -300 for EST).
    pub tz_offset: i32,
}

impl GitDate {
    /// Create a GitDate from a Unix timestamp and an offset in minutes.
    pub fn new(timestamp: i64, tz_offset_minutes: i32) -> Self {
        Self {
            timestamp,
            tz_offset: tz_offset_minutes,
        }
    }

    /// The current time in the local timezone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            timestamp: now.timestamp(),
            tz_offset: now.offset().local_minus_utc() / 60,
        }
    }

    /// Parse the raw git format `"<seconds> ±HHMM"`.
    pub fn parse_raw(input: &str) -> Result<Self> {
        let mut parts = input.trim().split_whitespace();
        let ts = parts
            .next()
            .ok_or_else(|| UtilError::DateParse("empty date".into()))?;
        let tz = parts
            .next()
            .ok_or_else(|| UtilError::DateParse(format!("missing timezone in '{input}'")))?;
        if parts.next().is_some() {
            return Err(UtilError::DateParse(format!(
                "trailing data in date '{input}'"
            )));
        }

        let timestamp: i64 = ts
            .parse()
            .map_err(|_| UtilError::DateParse(format!("invalid timestamp '{ts}'")))?;

        let (sign, digits) = match tz.as_bytes().first() {
            Some(b'+') => (1, &tz[1..]),
            Some(b'-') => (-1, &tz[1..]),
            _ => {
                return Err(UtilError::DateParse(format!(
                    "timezone '{tz}' missing sign"
                )))
            }
        };
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UtilError::DateParse(format!("invalid timezone '{tz}'")));
        }
        let hours: i32 = digits[..2].parse().unwrap_or(0);
        let mins: i32 = digits[2..].parse().unwrap_or(0);

        Ok(Self {
            timestamp,
            tz_offset: sign * (hours * 60 + mins),
        })
    }

    /// Format in the raw git form `"<seconds> ±HHMM"`.
    pub fn format_raw(&self) -> String {
        let sign = if self.tz_offset < 0 { '-' } else { '+' };
        let abs = self.tz_offset.unsigned_abs();
        format!("{} {}{:02}{:02}", self.timestamp, sign, abs / 60, abs % 60)
    }
}

/// An identity plus timestamp, as stored in commit and tag headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub date: GitDate,
}

impl Signature {
    /// Create a signature from parts.
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, date: GitDate) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date,
        }
    }

    /// Build a signature from an ident string (`"Name <email>"`) and a
    /// separately supplied date.
    pub fn from_ident(ident: &BStr, date: GitDate) -> Result<Self> {
        let lt = ident
            .find_byte(b'<')
            .ok_or_else(|| UtilError::SignatureParse("missing '<' in ident".into()))?;
        let gt = ident[lt..]
            .find_byte(b'>')
            .map(|p| p + lt)
            .ok_or_else(|| UtilError::SignatureParse("missing '>' in ident".into()))?;
        Ok(Self {
            name: BString::from(ident[..lt].trim_end_with(|c| c == ' ')),
            email: BString::from(&ident[lt + 1..gt]),
            date,
        })
    }

    /// Parse the on-disk form `"Name <email> 1234567890 +0000"`.
    pub fn parse(input: &BStr) -> Result<Self> {
        let lt = input
            .find_byte(b'<')
            .ok_or_else(|| UtilError::SignatureParse("missing '<'".into()))?;
        let gt = input[lt..]
            .find_byte(b'>')
            .map(|p| p + lt)
            .ok_or_else(|| UtilError::SignatureParse("missing '>'".into()))?;

        let name = input[..lt].trim_end_with(|c| c == ' ');
        let email = &input[lt + 1..gt];
        let date_str = std::str::from_utf8(input[gt + 1..].trim())
            .map_err(|_| UtilError::SignatureParse("non-UTF8 date".into()))?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            date: GitDate::parse_raw(date_str)?,
        })
    }

    /// Serialize to the on-disk form.
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(self.name.clone());
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.date.format_raw().as_bytes());
        out
    }
}
