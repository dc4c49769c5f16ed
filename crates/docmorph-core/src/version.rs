//! Semantic document versions.
//!
//! Every persisted document carries a `"major.minor.patch"` string in its
//! version field. Versions order lexicographically by component, and a
//! document without a version field is treated as [`DocumentVersion::DEFAULT`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A `major.minor.patch` version assigned to a document shape or migration.
///
/// Field order matters: the derived `Ord` compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocumentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl DocumentVersion {
    /// Version of a document stored without a version field.
    pub const DEFAULT: DocumentVersion = DocumentVersion::new(0, 0, 0);

    /// Baseline used when no stored baseline exists.
    pub const EMPTY: DocumentVersion = DocumentVersion::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the canonical `"major.minor.patch"` form.
    ///
    /// # Examples
    ///
    /// ```
    /// use docmorph_core::DocumentVersion;
    ///
    /// let v = DocumentVersion::parse("1.4.0").unwrap();
    /// assert_eq!(v, DocumentVersion::new(1, 4, 0));
    /// assert_eq!(v.to_string(), "1.4.0");
    ///
    /// assert!(DocumentVersion::parse("1.4").is_err());
    /// assert!(DocumentVersion::parse("01.4.0").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let major = parse_component(s, parts.next())?;
        let minor = parse_component(s, parts.next())?;
        let patch = parse_component(s, parts.next())?;
        if parts.next().is_some() {
            return Err(Error::Format(format!(
                "'{}' has more than three components",
                s
            )));
        }
        Ok(Self::new(major, minor, patch))
    }

    /// True for `0.0.0`.
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

fn parse_component(input: &str, part: Option<&str>) -> Result<u32> {
    let part = part.ok_or_else(|| {
        Error::Format(format!("'{}' is not of the form major.minor.patch", input))
    })?;

    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Format(format!(
            "'{}' contains a non-numeric component '{}'",
            input, part
        )));
    }
    // Components are canonical: no leading zeros.
    if part.len() > 1 && part.starts_with('0') {
        return Err(Error::Format(format!(
            "'{}' contains a component with a leading zero",
            input
        )));
    }

    part.parse::<u32>()
        .map_err(|_| Error::Format(format!("'{}' component '{}' is out of range", input, part)))
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for DocumentVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for DocumentVersion {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DocumentVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
