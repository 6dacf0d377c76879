//! Read-only parsing of git's INI-like configuration format.
//!
//! Exposes the file as `{section → {key → value}}` maps. Section headers
//! may carry a quoted subsection (`[remote "origin"]`), which is folded
//! into the section name as `remote.origin`. Writing is not supported.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Errors from configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A parsed configuration file: section name → key → value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigFile {
    /// Read and parse a config file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::parse(&data)
    }

    /// Parse config text.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (idx, raw_line) in input.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let header = rest.strip_suffix(']').ok_or(ConfigError::Parse {
                    line: line_no,
                    reason: "unterminated section header".into(),
                })?;
                let name = parse_section_name(header, line_no)?;
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            let section = current.as_ref().ok_or(ConfigError::Parse {
                line: line_no,
                reason: "key outside of any section".into(),
            })?;

            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim(), unquote(v.trim())),
                // A bare key is a boolean true.
                None => (line, "true".to_string()),
            };
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: "empty key".into(),
                });
            }
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.to_ascii_lowercase(), value);
        }

        Ok(Self { sections })
    }

    /// Look up a value by section and key.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_ascii_lowercase())?
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All keys of a section.
    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&name.to_ascii_lowercase())
    }

    /// The full section map.
    pub fn sections(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.sections
    }
}

/// Section names are lowercased; quoted subsections keep their case and
/// join with a dot: `core` or `remote.origin`.
fn parse_section_name(header: &str, line_no: usize) -> Result<String, ConfigError> {
    let header = header.trim();
    match header.split_once(char::is_whitespace) {
        Some((name, sub)) => {
            let sub = sub.trim();
            let sub = sub
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or(ConfigError::Parse {
                    line: line_no,
                    reason: "subsection must be quoted".into(),
                })?;
            Ok(format!("{}.{}", name.to_ascii_lowercase(), sub))
        }
        None => Ok(header.to_ascii_lowercase()),
    }
}

/// Drop a trailing `#` or `;` comment that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' | ';' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}
