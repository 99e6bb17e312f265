//! Framework versions and the runner compatibility gate
//!
//! Runner descriptors declare the range of framework versions they support.
//! [`check_compatibility`] classifies the current version against that range;
//! producing the user-facing remediation hint is left to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version of the framework these runners are launched by.
///
/// Kept in step with the workspace version (see the `current_matches_package` test).
pub const FRAMEWORK_VERSION: Version = Version::new(1, 0, 0);

/// A `MAJOR.MINOR.PATCH` version.
///
/// Ordering is lexicographic over the three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether `minimum <= self <= maximum`.
    #[must_use]
    pub fn is_within_range(&self, minimum: &Version, maximum: &Version) -> bool {
        minimum <= self && self <= maximum
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version '{value}': {reason}")]
pub struct VersionParseError {
    pub value: String,
    pub reason: String,
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| VersionParseError {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        // Build metadata never participates in ordering
        let core = s.trim().split_once('+').map_or(s.trim(), |(core, _)| core);
        if core.is_empty() {
            return Err(fail("empty version"));
        }

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(fail("expected MAJOR.MINOR.PATCH"));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(fail("components must be non-negative integers"));
            }
            *slot = part
                .parse::<u64>()
                .map_err(|_| fail("component out of range"))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

/// Inclusive range of framework versions a runner supports.
///
/// An empty `maximum` leaves the range open-ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionSupport {
    pub minimum: String,
    #[serde(default)]
    pub maximum: String,
}

/// Why a runner's supported range rejects the current version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityError {
    #[error("Invalid {bound} support version: {source}")]
    InvalidVersion {
        bound: &'static str,
        #[source]
        source: VersionParseError,
    },

    #[error("Version {current} is not between {minimum} and {maximum}")]
    OutOfRange {
        current: Version,
        minimum: Version,
        maximum: Version,
    },

    #[error("Minimum support version {minimum} is higher than current version {current}")]
    BelowMinimum { current: Version, minimum: Version },
}

/// Check `current` against the runner's declared support range.
pub fn check_compatibility(
    current: &Version,
    support: &VersionSupport,
) -> Result<(), CompatibilityError> {
    let minimum: Version =
        support
            .minimum
            .parse()
            .map_err(|source| CompatibilityError::InvalidVersion {
                bound: "minimum",
                source,
            })?;

    if support.maximum.trim().is_empty() {
        if minimum <= *current {
            return Ok(());
        }
        return Err(CompatibilityError::BelowMinimum {
            current: *current,
            minimum,
        });
    }

    let maximum: Version =
        support
            .maximum
            .parse()
            .map_err(|source| CompatibilityError::InvalidVersion {
                bound: "maximum",
                source,
            })?;

    if current.is_within_range(&minimum, &maximum) {
        Ok(())
    } else {
        Err(CompatibilityError::OutOfRange {
            current: *current,
            minimum,
            maximum,
        })
    }
}
