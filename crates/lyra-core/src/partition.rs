//! Hive-style partition keys for partitioned table layouts.
//!
//! A partitioned write places each row group under a directory path built
//! from the partition columns, e.g. `year=2001/artist_id=A1`. Column order
//! follows the declared partition spec, not alphabetical order, so the
//! layout matches what downstream engines expect from a
//! `PARTITIONED BY (year, artist_id)` table.
//!
//! String values are percent-encoded so arbitrary text cannot escape the
//! partition directory or collide with the `key=value` syntax. Null values
//! render as the conventional `__HIVE_DEFAULT_PARTITION__` sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar value types allowed in partition keys.
///
/// Floats are intentionally excluded: float-valued partition columns
/// produce unstable directory names across writers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionValue {
    /// 64-bit signed integer.
    Int64(i64),
    /// Arbitrary string (percent-encoded in path form).
    String(String),
    /// Explicit null value.
    Null,
}

impl PartitionValue {
    /// Returns the path-safe rendering of this value.
    #[must_use]
    pub fn path_repr(&self) -> String {
        match self {
            Self::Int64(n) => n.to_string(),
            Self::String(s) => escape_path_value(s),
            Self::Null => "__HIVE_DEFAULT_PARTITION__".to_string(),
        }
    }
}

/// Percent-encodes characters that are unsafe inside a path segment.
///
/// Alphanumerics and `-`, `_`, `.` pass through; everything else (including
/// `/`, `=`, `%`, whitespace, and non-ASCII bytes) is `%XX`-escaped.
fn escape_path_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Ordered multi-column partition key.
///
/// Two keys are equal when their columns and values match in order, which
/// is the grouping identity a partitioned writer needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PartitionKey(Vec<(String, PartitionValue)>);

impl PartitionKey {
    /// Creates a new empty partition key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column dimension to the key.
    pub fn push(&mut self, column: impl Into<String>, value: PartitionValue) {
        self.0.push((column.into(), value));
    }

    /// Returns true if the key has no dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the `column=value` path segments in declaration order.
    #[must_use]
    pub fn path_segments(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(col, v)| format!("{col}={}", v.path_repr()))
            .collect()
    }

    /// Returns an iterator over dimensions.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PartitionValue)> {
        self.0.iter().map(|(c, v)| (c, v))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segments().join("/"))
    }
}
