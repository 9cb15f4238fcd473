//! The untrusted options bag and the reader that turns it into typed values.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::domain::echo;
use crate::kind::OperationKind;

/// Largest accepted time bound: one day.
const MAX_TIME_MS: u64 = 86_400_000;

/// String-valued options exactly as the caller sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionsBag(BTreeMap<String, String>);

impl OptionsBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Parse a `key=value` pair as given on a command line.
    pub fn parse_pair(pair: &str) -> ck_core::Result<(String, String)> {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ck_core::Error::validation(format!("expected key=value, got {}", echo(pair)))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ck_core::Error::validation(format!(
                "empty option name in {}",
                echo(pair)
            )));
        }
        Ok((key.to_string(), value.trim().to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionsBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// TimeRange
// ---------------------------------------------------------------------------

/// Optional start/end bounds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start_ms: Option<u64>,
    end_ms: Option<u64>,
}

impl TimeRange {
    /// Build a range; `None` when both bounds are absent.
    pub fn new(start_ms: Option<u64>, end_ms: Option<u64>) -> ck_core::Result<Option<Self>> {
        if let Some(end) = end_ms {
            let start = start_ms.unwrap_or(0);
            if end <= start {
                return Err(ck_core::Error::validation(format!(
                    "end ({}) must be after start ({})",
                    crate::plan::format_seconds(end),
                    crate::plan::format_seconds(start)
                )));
            }
        }
        // A zero start is the same as no start.
        let start_ms = start_ms.filter(|s| *s > 0);
        if start_ms.is_none() && end_ms.is_none() {
            return Ok(None);
        }
        Ok(Some(Self { start_ms, end_ms }))
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    /// Length of the clip when both ends are known relative to a source of
    /// `source_ms` (if known).
    pub fn clip_ms(&self, source_ms: Option<u64>) -> Option<u64> {
        let start = self.start_ms.unwrap_or(0);
        let end = match (self.end_ms, source_ms) {
            (Some(end), Some(src)) => end.min(src),
            (Some(end), None) => end,
            (None, Some(src)) => src,
            (None, None) => return None,
        };
        Some(end.saturating_sub(start))
    }
}

/// Parse a time bound: `SS[.mmm]` or `HH:MM:SS[.mmm]`.
///
/// The grammar is closed; the builder re-serializes the parsed value, so the
/// caller's text never reaches a directive.
pub fn parse_time_ms(raw: &str) -> ck_core::Result<u64> {
    let invalid = || {
        ck_core::Error::validation(format!(
            "invalid time {}: expected seconds (e.g. 12.5) or HH:MM:SS[.mmm]",
            echo(raw)
        ))
    };

    let s = raw.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (s, None),
    };

    let millis = match frac {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 3 && f.bytes().all(|b| b.is_ascii_digit()) => {
            // Right-pad so ".5" means 500 ms.
            format!("{f:0<3}").parse::<u64>().map_err(|_| invalid())?
        }
        Some(_) => return Err(invalid()),
    };

    let parts: Vec<&str> = whole.split(':').collect();
    let digits = |p: &str, max_len: usize| -> ck_core::Result<u64> {
        if p.is_empty() || p.len() > max_len || !p.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        p.parse::<u64>().map_err(|_| invalid())
    };

    let seconds = match parts.as_slice() {
        [secs] => digits(secs, 5)?,
        [h, m, s] => {
            let (h, m, s) = (digits(h, 2)?, digits(m, 2)?, digits(s, 2)?);
            if m >= 60 || s >= 60 {
                return Err(invalid());
            }
            h * 3600 + m * 60 + s
        }
        _ => return Err(invalid()),
    };

    let total = seconds * 1000 + millis;
    if total > MAX_TIME_MS {
        return Err(ck_core::Error::validation(format!(
            "time {} exceeds the 24h limit",
            echo(raw)
        )));
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// OptionReader
// ---------------------------------------------------------------------------

/// Reads typed values out of an [`OptionsBag`] for one operation kind and
/// rejects keys the operation does not know.
pub struct OptionReader<'a> {
    kind: OperationKind,
    bag: &'a OptionsBag,
    consumed: BTreeSet<&'static str>,
}

impl<'a> OptionReader<'a> {
    pub fn new(kind: OperationKind, bag: &'a OptionsBag) -> Self {
        Self {
            kind,
            bag,
            consumed: BTreeSet::new(),
        }
    }

    fn raw(&mut self, key: &'static str) -> Option<&'a str> {
        self.consumed.insert(key);
        self.bag.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Read an enumerated option; absent or blank values yield `default`.
    pub fn get<T>(&mut self, key: &'static str, default: T) -> ck_core::Result<T>
    where
        T: FromStr<Err = ck_core::Error>,
    {
        match self.raw(key) {
            Some(v) => v.parse(),
            None => Ok(default),
        }
    }

    /// Read the `start`/`end` pair.
    pub fn time_range(&mut self) -> ck_core::Result<Option<TimeRange>> {
        let start = self.raw("start").map(parse_time_ms).transpose()?;
        let end = self.raw("end").map(parse_time_ms).transpose()?;
        TimeRange::new(start, end)
    }

    /// Fail if the bag carried keys this operation never read.
    pub fn finish(self) -> ck_core::Result<()> {
        let unknown: Vec<String> = self
            .bag
            .keys()
            .filter(|k| !self.consumed.contains(*k))
            .map(echo)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ck_core::Error::validation(format!(
                "unknown option(s) for {}: {}",
                self.kind,
                unknown.join(", ")
            )))
        }
    }
}
