//! NuGet package versions.
//!
//! NuGet versions are "almost semver": they may have one to four numeric
//! parts (the fourth being a revision) and an optional pre-release label.
//! They are normalized onto [`semver::Version`] for ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use thiserror::Error;

/// Error returned for strings that are not package versions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package version `{0}`")]
pub struct InvalidVersion(pub String);

/// A parsed package version, remembering how it was written.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    version: Version,
    revision: u64,
    original: String,
}

impl PackageVersion {
    /// The semver part of the version (revision excluded), with the
    /// pre-release label lowercased.
    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// The fourth numeric component, 0 if absent.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// The version exactly as it appeared in the source file.
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl FromStr for PackageVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s).ok_or_else(|| InvalidVersion(s.to_string()))
    }
}

/// Parse a NuGet version string.
///
/// Accepts `1`, `1.2`, `1.2.3`, `1.2.3.4`, each optionally followed by a
/// `-prerelease` label and `+build` metadata. Anything else is rejected.
pub fn parse_version(s: &str) -> Option<PackageVersion> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (rest, build) = match trimmed.split_once('+') {
        Some((rest, build)) => (rest, BuildMetadata::new(build).ok()?),
        None => (trimmed, BuildMetadata::EMPTY),
    };
    let (numbers, pre) = match rest.split_once('-') {
        // Labels compare case-insensitively, `-Beta` is `-beta`.
        Some((numbers, pre)) => (numbers, Prerelease::new(&pre.to_ascii_lowercase()).ok()?),
        None => (rest, Prerelease::EMPTY),
    };

    let parts = numbers
        .split('.')
        .map(|p| {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                p.parse::<u64>().ok()
            }
        })
        .collect::<Option<Vec<u64>>>()?;

    let (major, minor, patch, revision) = match parts.as_slice() {
        [major] => (*major, 0, 0, 0),
        [major, minor] => (*major, *minor, 0, 0),
        [major, minor, patch] => (*major, *minor, *patch, 0),
        [major, minor, patch, revision] => (*major, *minor, *patch, *revision),
        _ => return None,
    };

    let mut version = Version::new(major, minor, patch);
    version.pre = pre;
    version.build = build;

    Some(PackageVersion {
        version,
        revision,
        original: trimmed.to_string(),
    })
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = &self.version;
        let b = &other.version;
        (a.major, a.minor, a.patch, self.revision)
            .cmp(&(b.major, b.minor, b.patch, other.revision))
            // A release sorts above any of its pre-releases.
            .then_with(|| match (a.pre.is_empty(), b.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.pre.cmp(&b.pre),
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows ordering, so `1.0` and `1.0.0` are the same version.
impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_short_versions() {
        assert_eq!(v("1").semver(), &Version::new(1, 0, 0));
        assert_eq!(v("1.2").semver(), &Version::new(1, 2, 0));
        assert_eq!(v("1.2.3").semver(), &Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_revision() {
        let version = v("4.5.0.12");
        assert_eq!(version.semver(), &Version::new(4, 5, 0));
        assert_eq!(version.revision(), 12);
        assert_eq!(version.to_string(), "4.5.0.12");
    }

    #[test]
    fn test_parse_prerelease() {
        let version = v("2.0.0-beta1");
        assert!(version.is_prerelease());
        assert_eq!(version.semver().pre.as_str(), "beta1");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_version("").is_none());
        assert!(parse_version("abc").is_none());
        assert!(parse_version("1..2").is_none());
        assert!(parse_version("1.2.3.4.5").is_none());
        assert!(parse_version("1.x").is_none());
        assert!(parse_version("-1.0").is_none());
    }

    #[test]
    fn test_ordering_is_semantic() {
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("1.2.0") > v("1.0.0"));
        assert!(v("1.0.0.1") > v("1.0.0"));
        assert!(v("1.0.0") > v("1.0.0-rc1"));
        assert!(v("1.0.0-rc2") > v("1.0.0-rc1"));
    }

    #[test]
    fn test_prerelease_label_ignores_case() {
        assert_eq!(v("1.0.0-Beta"), v("1.0.0-beta"));
        assert_eq!(v("1.0.0-Beta").to_string(), "1.0.0-Beta");
        assert!(v("1.0.0-RC2") > v("1.0.0-rc1"));
    }

    #[test]
    fn test_equivalent_spellings_are_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1.0.0.0"), v("1"));
    }
}
