//! Versions, version ranges, and selection strategies.
//!
//! Versions are four-part tuples `major.minor.micro.qualifier`. Missing
//! numeric parts default to zero and a missing qualifier is empty, so
//! `1.2` and `1.2.0` are the same version. Ordering is tuple-lexicographic
//! with the qualifier compared as a plain string.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,9})(?:\.(\d{1,9})(?:\.(\d{1,9})(?:\.([-_0-9A-Za-z]+))?)?)?$")
        .expect("version pattern is valid")
});

/// Errors from parsing versions and ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version syntax: `{0}`")]
    InvalidVersion(String),

    #[error("invalid version range: `{0}`")]
    InvalidRange(String),
}

/// A four-part version.
///
/// Field order matters: the derived `Ord` compares major, minor, micro and
/// then the qualifier as a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl Version {
    /// Create a version without a qualifier.
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Version {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Attach a qualifier.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// The lowest possible version, `0.0.0`.
    pub fn lowest() -> Self {
        Version::default()
    }

    /// Check whether a string is valid version syntax.
    pub fn is_valid(s: &str) -> bool {
        VERSION_PATTERN.is_match(s.trim())
    }

    /// Parse a version string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let trimmed = s.trim();
        let caps = VERSION_PATTERN
            .captures(trimmed)
            .ok_or_else(|| VersionError::InvalidVersion(s.to_string()))?;

        let part = |i: usize| -> Result<u64, VersionError> {
            match caps.get(i) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| VersionError::InvalidVersion(s.to_string())),
                None => Ok(0),
            }
        };

        Ok(Version {
            major: part(1)?,
            minor: part(2)?,
            micro: part(3)?,
            qualifier: caps
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A set of acceptable versions.
///
/// A bare version `1.2` means "at least 1.2". The interval form uses
/// brackets for inclusive and parentheses for exclusive bounds:
/// `[1.0,2.0)` accepts 1.0 up to but not including 2.0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionRange {
    AtLeast(Version),
    Interval {
        low: Version,
        low_inclusive: bool,
        high: Version,
        high_inclusive: bool,
    },
}

impl VersionRange {
    /// The range that accepts every version.
    pub fn any() -> Self {
        VersionRange::AtLeast(Version::lowest())
    }

    /// Parse a range string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let trimmed = s.trim();
        let first = trimmed.chars().next();

        if !matches!(first, Some('[') | Some('(')) {
            return Version::parse(trimmed)
                .map(VersionRange::AtLeast)
                .map_err(|_| VersionError::InvalidRange(s.to_string()));
        }

        let last = trimmed.chars().last();
        if !matches!(last, Some(']') | Some(')')) || trimmed.len() < 2 {
            return Err(VersionError::InvalidRange(s.to_string()));
        }

        let inner = &trimmed[1..trimmed.len() - 1];
        let (low, high) = inner
            .split_once(',')
            .ok_or_else(|| VersionError::InvalidRange(s.to_string()))?;

        let low = Version::parse(low).map_err(|_| VersionError::InvalidRange(s.to_string()))?;
        let high = Version::parse(high).map_err(|_| VersionError::InvalidRange(s.to_string()))?;

        Ok(VersionRange::Interval {
            low,
            low_inclusive: first == Some('['),
            high,
            high_inclusive: last == Some(']'),
        })
    }

    /// Check whether `version` lies within this range.
    pub fn includes(&self, version: &Version) -> bool {
        match self {
            VersionRange::AtLeast(floor) => version >= floor,
            VersionRange::Interval {
                low,
                low_inclusive,
                high,
                high_inclusive,
            } => {
                let above = if *low_inclusive {
                    version >= low
                } else {
                    version > low
                };
                let below = if *high_inclusive {
                    version <= high
                } else {
                    version < high
                };
                above && below
            }
        }
    }

    /// The single version this range was written as, if it is a bare floor.
    pub fn floor(&self) -> Option<&Version> {
        match self {
            VersionRange::AtLeast(v) => Some(v),
            VersionRange::Interval { .. } => None,
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::AtLeast(v) => write!(f, "{}", v),
            VersionRange::Interval {
                low,
                low_inclusive,
                high,
                high_inclusive,
            } => write!(
                f,
                "{}{},{}{}",
                if *low_inclusive { '[' } else { '(' },
                low,
                high,
                if *high_inclusive { ']' } else { ')' }
            ),
        }
    }
}

/// Tie-break policy when several versions satisfy a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    #[default]
    Highest,
    Lowest,
    Exact,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" => Ok(Strategy::Highest),
            "lowest" => Ok(Strategy::Lowest),
            "exact" => Ok(Strategy::Exact),
            _ => Err(format!(
                "invalid strategy '{}'; expected 'highest', 'lowest', or 'exact'",
                s
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Highest => write!(f, "highest"),
            Strategy::Lowest => write!(f, "lowest"),
            Strategy::Exact => write!(f, "exact"),
        }
    }
}

/// Non-numeric version specifiers that change how an entry resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeToken {
    /// The raw output directory of a workspace project.
    Project,
    /// The workspace project if present, else the highest repository version.
    Latest,
    /// The packaged deliverable of a workspace project.
    Snapshot,
    /// A file path relative to the requesting project.
    File,
}

impl RangeToken {
    /// Recognize a token; anything else is treated as a version range.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(RangeToken::Project),
            "latest" => Some(RangeToken::Latest),
            "snapshot" => Some(RangeToken::Snapshot),
            "file" => Some(RangeToken::File),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeToken::Project => "project",
            RangeToken::Latest => "latest",
            RangeToken::Snapshot => "snapshot",
            RangeToken::File => "file",
        }
    }
}

impl fmt::Display for RangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
