//! Git dates and author/committer signatures.
//!
//! The wire form of a git date is `<unix-seconds> <±HHMM>`; it is parsed by
//! hand. chrono only backs the human-facing formatters.

use bstr::{BStr, BString, ByteSlice};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::error::UtilError;
use crate::Result;

/// A parsed git date with timezone information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitDate {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Timezone offset in minutes from UTC (e.g. -300 for EST).
    pub tz_offset: i32,
}

/// Git stores the timezone as a decimal `±HHMM` integer (-0130 => -130).
fn tz_decimal_to_minutes(tz: i32) -> i32 {
    let sign = if tz < 0 { -1 } else { 1 };
    let abs = tz.abs();
    sign * (abs / 100 * 60 + abs % 100)
}

fn minutes_to_tz_decimal(minutes: i32) -> i32 {
    let sign = if minutes < 0 { -1 } else { 1 };
    let abs = minutes.abs();
    sign * (abs / 60 * 100 + abs % 60)
}

impl GitDate {
    /// Create from a Unix timestamp and a timezone offset in minutes.
    pub fn new(timestamp: i64, tz_offset_minutes: i32) -> Self {
        Self {
            timestamp,
            tz_offset: tz_offset_minutes,
        }
    }

    /// Parse the raw wire format: `"<timestamp> <±HHMM>"` (offset optional).
    pub fn parse_raw(input: &str) -> Result<Self> {
        let input = input.trim();
        let mut parts = input.splitn(2, ' ');

        let ts_str = parts.next().unwrap_or("");
        let timestamp: i64 = ts_str
            .parse()
            .map_err(|_| UtilError::DateParse(format!("invalid timestamp: '{ts_str}'")))?;

        let tz_offset = match parts.next() {
            Some(tz_str) => {
                let tz_str = tz_str.trim();
                let tz_int: i32 = tz_str
                    .parse()
                    .map_err(|_| UtilError::DateParse(format!("invalid timezone: '{tz_str}'")))?;
                tz_decimal_to_minutes(tz_int)
            }
            None => 0,
        };

        Ok(Self {
            timestamp,
            tz_offset,
        })
    }

    /// Format in the raw wire form: `"<timestamp> <±HHMM>"`.
    pub fn to_raw(&self) -> String {
        format!(
            "{} {:+05}",
            self.timestamp,
            minutes_to_tz_decimal(self.tz_offset)
        )
    }

    /// Format as ISO 8601 in the stored timezone: `"2025-01-15 12:00:00 +0000"`.
    pub fn to_iso(&self) -> String {
        self.in_stored_offset()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S %z").to_string())
            .unwrap_or_else(|| self.to_raw())
    }

    /// Format as a bare date: `"2025-01-15"`.
    pub fn to_short(&self) -> String {
        self.in_stored_offset()
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| self.to_raw())
    }

    fn in_stored_offset(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.tz_offset * 60)?;
        match Utc.timestamp_opt(self.timestamp, 0) {
            chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&offset)),
            _ => None,
        }
    }
}

/// An author/committer/tagger identity with timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub date: GitDate,
}

impl Signature {
    /// Parse the git identity line value: `Name <email> <timestamp> <±HHMM>`.
    pub fn parse(input: &BStr) -> Result<Self> {
        let input: &[u8] = input.as_ref();

        let gt = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| UtilError::SignatureParse("missing '>'".into()))?;
        let lt = input[..gt]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| UtilError::SignatureParse("missing '<'".into()))?;

        let name = BString::from(input[..lt].trim());
        let email = BString::from(&input[lt + 1..gt]);

        let date_part = input[gt + 1..].trim();
        let date_str = std::str::from_utf8(date_part)
            .map_err(|_| UtilError::SignatureParse("non-UTF8 date".into()))?;
        let date = GitDate::parse_raw(date_str)?;

        Ok(Self { name, email, date })
    }

    /// Serialize to the git identity line value.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + self.email.len() + 24);
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.date.to_raw().as_bytes());
        out
    }
}
