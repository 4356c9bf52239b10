//! Dotted numeric versions
//!
//! Versions compare segment by segment as integers, so `3.10` sorts above `3.9`.
//! Missing trailing segments count as zero: `3.7 == 3.7.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidVersion(input.to_string()));
        }
        let segments = trimmed
            .split('.')
            .map(|s| s.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ResolveError::InvalidVersion(input.to_string()))?;
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn major(&self) -> u64 {
        self.segments[0]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert!(v("3.10") > v("3.9"));
        assert!(v("10.0") > v("9.9.9"));
        assert!(v("2.7") < v("3.7"));
    }

    #[test]
    fn test_trailing_zero_segments_equal() {
        assert_eq!(v("3.7"), v("3.7.0"));
        assert_eq!(v("3").cmp(&v("3.0.0")), Ordering::Equal);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("3.x").is_err());
        assert!(Version::parse("3..7").is_err());
        assert!(Version::parse("3.7-32").is_err());
    }

    #[test]
    fn test_display_keeps_original_spelling() {
        assert_eq!(v(" 3.07 ").to_string(), "3.07");
        assert_eq!(v("3.07"), v("3.7"));
        assert_eq!(v("3.11").major(), 3);
    }

    #[test]
    fn test_sorting() {
        let mut versions = vec![v("3.10"), v("2.7"), v("3.9"), v("3.7")];
        versions.sort();
        let sorted: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(sorted, vec!["2.7", "3.7", "3.9", "3.10"]);
    }
}
