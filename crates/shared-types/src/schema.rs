//! # Schema Versioning
//!
//! Every envelope carries a `schemaVersion` in its header. A deployed build
//! fixes three constants:
//!
//! - [`CURRENT_SCHEMA_VERSION`]: stamped on every outbound envelope.
//! - [`MIN_COMPATIBLE_SCHEMA_VERSION`] / [`MAX_COMPATIBLE_SCHEMA_VERSION`]:
//!   the inclusive range of versions this build still accepts.
//!
//! Versions are compared numerically per segment, so `0.1.10` orders after
//! `0.1.2`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schema version produced by this build.
pub const CURRENT_SCHEMA_VERSION: &str = "0.2.0";

/// Oldest schema version accepted (inclusive).
pub const MIN_COMPATIBLE_SCHEMA_VERSION: &str = "0.1.2";

/// Newest schema version accepted (inclusive).
pub const MAX_COMPATIBLE_SCHEMA_VERSION: &str = "0.2.5";

/// A three-part dotted version (`major.minor.patch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Error returned when a version string is not `N.N.N`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed schema version: {0:?}")]
pub struct ParseVersionError(pub String);

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The version this build stamps on outbound envelopes.
    pub fn current() -> Self {
        // The constants are checked by `test_build_constants_parse`.
        Self::from_str(CURRENT_SCHEMA_VERSION).unwrap_or(Self::new(0, 0, 0))
    }

    /// Inclusive compatibility range for this build.
    pub fn compatible_range() -> (Self, Self) {
        let min = Self::from_str(MIN_COMPATIBLE_SCHEMA_VERSION).unwrap_or(Self::new(0, 0, 0));
        let max = Self::from_str(MAX_COMPATIBLE_SCHEMA_VERSION).unwrap_or(Self::current());
        (min, max)
    }

    /// Classify a received version against the build constants.
    pub fn compatibility(&self) -> Compatibility {
        let (min, max) = Self::compatible_range();
        if *self == Self::current() {
            Compatibility::Current
        } else if *self >= min && *self <= max {
            Compatibility::Compatible
        } else {
            Compatibility::Incompatible
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, ParseVersionError> {
            parts
                .next()
                .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| ParseVersionError(s.to_string()))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(ParseVersionError(s.to_string()));
        }
        Ok(version)
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = ParseVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How a received schema version relates to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Identical to [`CURRENT_SCHEMA_VERSION`]; accepted silently.
    Current,
    /// Inside the compatible range; accepted with a warning.
    Compatible,
    /// Outside the compatible range; rejected.
    Incompatible,
}
