//! Read-only git configuration lookup.
//!
//! Parses the INI-like `config` file (`[section]` and `[section "sub"]`
//! headers with `key = value` lines) into a flat multi-map queried by
//! dotted key (`core.bare`, `remote.origin.url`). Writing configuration is
//! out of scope.

mod parse;

pub use parse::parse_config;

use std::path::Path;

use bstr::{BStr, BString};

/// Errors from configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("config value for '{key}' is not a {expected}: {value}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One `key = value` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    /// Full dotted key: lowercased section (and key), case-preserved
    /// subsection.
    pub key: String,
    /// Raw value; `None` for a bare boolean key (`[core]\nbare`).
    pub value: Option<BString>,
}

/// A parsed configuration file.
///
/// Later occurrences of a key shadow earlier ones for single-value
/// lookups; all occurrences remain reachable for multi-valued keys.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    entries: Vec<ConfigEntry>,
}

impl ConfigFile {
    /// Parse configuration bytes.
    pub fn parse(data: &[u8]) -> Result<Self, ConfigError> {
        Ok(Self {
            entries: parse_config(data)?,
        })
    }

    /// Load a config file from disk. A missing file is an empty config.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read(path) {
            Ok(data) => Self::parse(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// The last value set for a dotted key.
    pub fn get(&self, key: &str) -> Option<&BStr> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .and_then(|e| e.value.as_deref())
            .map(BStr::new)
    }

    /// Every value set for a dotted key, in file order.
    pub fn get_all(&self, key: &str) -> Vec<&BStr> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .filter(|e| e.key == key)
            .filter_map(|e| e.value.as_deref())
            .map(BStr::new)
            .collect()
    }

    /// A string value, UTF-8 lossy.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// A boolean value using git's truth rules. A key present with no
    /// value is true.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let normalized = normalize_key(key);
        let Some(entry) = self.entries.iter().rev().find(|e| e.key == normalized) else {
            return Ok(None);
        };
        let Some(ref value) = entry.value else {
            return Ok(Some(true));
        };
        match value.to_ascii_lowercase().as_slice() {
            b"true" | b"yes" | b"on" | b"1" => Ok(Some(true)),
            b"false" | b"no" | b"off" | b"0" | b"" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "boolean",
                value: value.to_string(),
            }),
        }
    }

    /// An integer value, honoring git's `k`/`m`/`g` suffixes.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let text = value.to_string();
        let (digits, scale) = match text.to_ascii_lowercase() {
            s if s.ends_with('k') => (s[..s.len() - 1].to_string(), 1024),
            s if s.ends_with('m') => (s[..s.len() - 1].to_string(), 1024 * 1024),
            s if s.ends_with('g') => (s[..s.len() - 1].to_string(), 1024 * 1024 * 1024),
            s => (s, 1),
        };
        digits
            .trim()
            .parse::<i64>()
            .map(|n| Some(n * scale))
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "integer",
                value: text,
            })
    }

    /// Every entry, in file order.
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Subsection names of a section (`remote` → `["origin", …]`).
    pub fn subsections(&self, section: &str) -> Vec<String> {
        let prefix = format!("{}.", section.to_ascii_lowercase());
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| {
                let rest = e.key.strip_prefix(&prefix)?;
                let (sub, _key) = rest.rsplit_once('.')?;
                Some(sub.to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Lowercase the section and key parts; the subsection (middle) is
/// case-sensitive.
fn normalize_key(key: &str) -> String {
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        [section, rest] => match rest.rsplit_once('.') {
            Some((sub, last)) => format!(
                "{}.{}.{}",
                section.to_ascii_lowercase(),
                sub,
                last.to_ascii_lowercase()
            ),
            None => format!("{}.{}", section.to_ascii_lowercase(), rest.to_ascii_lowercase()),
        },
        _ => key.to_ascii_lowercase(),
    }
}
