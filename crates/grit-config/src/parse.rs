//! Config file parsing for git's INI-like format.

use bstr::{BString, ByteSlice};

use crate::{ConfigEntry, ConfigError};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Parse configuration bytes into a flat entry list.
///
/// Handles `[section]` and `[section "sub"]` headers, `key = value` and
/// bare-key lines, `#`/`;` comments, double-quoted values with backslash
/// escapes, and backslash line continuation.
pub fn parse_config(input: &[u8]) -> Result<Vec<ConfigEntry>, ConfigError> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);

    let mut entries = Vec::new();
    let mut section: Option<String> = None;

    let mut lines = input.lines().enumerate();
    while let Some((line_no, raw_line)) = lines.next() {
        let line_no = line_no + 1;
        let line = raw_line.trim();
        if line.is_empty() || line[0] == b'#' || line[0] == b';' {
            continue;
        }

        if line[0] == b'[' {
            section = Some(parse_section_header(line, line_no)?);
            continue;
        }

        let Some(ref section) = section else {
            return Err(ConfigError::Parse {
                line: line_no,
                reason: "key before any section header".into(),
            });
        };

        // Re-join continuation lines (trailing backslash).
        let mut logical: Vec<u8> = raw_line.to_vec();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.extend_from_slice(next),
                None => break,
            }
        }

        let (key, value) = parse_key_value(logical.trim(), line_no)?;
        entries.push(ConfigEntry {
            key: format!("{section}.{key}"),
            value,
        });
    }

    Ok(entries)
}

fn ends_with_continuation(line: &[u8]) -> bool {
    // An odd run of trailing backslashes continues the line.
    let backslashes = line.iter().rev().take_while(|&&b| b == b'\\').count();
    backslashes % 2 == 1
}

/// Parse `[section]` or `[section "sub"]` into the dotted prefix.
fn parse_section_header(line: &[u8], line_no: usize) -> Result<String, ConfigError> {
    let close = line
        .iter()
        .position(|&b| b == b']')
        .ok_or(ConfigError::Parse {
            line: line_no,
            reason: "unterminated section header".into(),
        })?;
    let inner = line[1..close].trim();

    if let Some(quote_start) = inner.find_byte(b'"') {
        let name = inner[..quote_start].trim();
        let rest = &inner[quote_start + 1..];
        let quote_end = rest.iter().rposition(|&b| b == b'"').ok_or(ConfigError::Parse {
            line: line_no,
            reason: "unterminated subsection quote".into(),
        })?;
        let sub = unescape(&rest[..quote_end]);
        let name = validate_section_name(name, line_no)?;
        let sub = String::from_utf8_lossy(&sub).into_owned();
        return Ok(format!("{name}.{sub}"));
    }

    // The deprecated `[section.sub]` form lowercases everything.
    validate_section_name(inner, line_no)
}

fn validate_section_name(name: &[u8], line_no: usize) -> Result<String, ConfigError> {
    if name.is_empty()
        || !name
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
    {
        return Err(ConfigError::Parse {
            line: line_no,
            reason: format!("invalid section name: {:?}", name.as_bstr()),
        });
    }
    Ok(String::from_utf8_lossy(name).to_ascii_lowercase())
}

/// Parse one logical `key = value` (or bare `key`) line.
fn parse_key_value(
    line: &[u8],
    line_no: usize,
) -> Result<(String, Option<BString>), ConfigError> {
    let (key_part, value_part) = match line.find_byte(b'=') {
        Some(eq) => (line[..eq].trim(), Some(line[eq + 1..].trim())),
        None => (line.trim(), None),
    };

    if key_part.is_empty()
        || !key_part[0].is_ascii_alphabetic()
        || !key_part
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(ConfigError::Parse {
            line: line_no,
            reason: format!("invalid key: {:?}", key_part.as_bstr()),
        });
    }
    let key = String::from_utf8_lossy(key_part).to_ascii_lowercase();

    let value = match value_part {
        None => None,
        Some(raw) => Some(BString::from(parse_value(raw))),
    };
    Ok((key, value))
}

/// Strip comments outside quotes, resolve quoting and escapes.
fn parse_value(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut in_quotes = false;
    let mut i = 0;

    while i < raw.len() {
        let b = raw[i];
        match b {
            b'\\' if i + 1 < raw.len() => {
                i += 1;
                out.push(match raw[i] {
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'b' => 0x08,
                    other => other,
                });
            }
            b'"' => in_quotes = !in_quotes,
            b'#' | b';' if !in_quotes => break,
            _ => out.push(b),
        }
        i += 1;
    }

    if !in_quotes {
        // Trailing unquoted whitespace is insignificant.
        while out.last().is_some_and(|b| *b == b' ' || *b == b'\t') {
            out.pop();
        }
    }
    out
}

fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            i += 1;
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}
