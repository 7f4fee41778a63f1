// src/version/mod.rs

//! Version handling for stub selection
//!
//! Concrete versions (an installed library, the consumer's type checker) are
//! `semver::Version` values. Input is accepted leniently: a leading `v` and
//! missing minor/patch components are allowed (`v0.261` is `0.261.0`).
//! Ranges live in [`range`].

pub mod range;

pub use range::{
    Comparator, Interval, Operator, PartialVersion, RangeParseError, Specificity, Triple, Upper,
    VersionRange,
};
pub use semver::Version;

/// Parse a concrete version
///
/// Examples:
/// - "1.2.3" -> 1.2.3
/// - "v0.261" -> 0.261.0
/// - "4" -> 4.0.0
/// - "1.0.0-rc.1" -> 1.0.0-rc.1 (prerelease kept, ignored by range checks)
pub fn parse_version(text: &str) -> Result<Version, RangeParseError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(v) = Version::parse(body) {
        return Ok(v);
    }

    // Wildcards are not concrete
    if body.contains(['x', 'X', '*']) {
        return Err(RangeParseError::InvalidVersion(text.to_string()));
    }

    let partial = PartialVersion::parse(body)
        .map_err(|_| RangeParseError::InvalidVersion(text.to_string()))?;
    let floor = partial.floor();
    Ok(Version::new(floor.major, floor.minor, floor.patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_full() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version(" v0.261.0 ").unwrap(), Version::new(0, 261, 0));
    }

    #[test]
    fn test_parse_version_partial() {
        assert_eq!(parse_version("v0.261").unwrap(), Version::new(0, 261, 0));
        assert_eq!(parse_version("4").unwrap(), Version::new(4, 0, 0));
    }

    #[test]
    fn test_parse_version_prerelease() {
        let v = parse_version("1.0.0-rc.1").unwrap();
        assert_eq!(v.pre.as_str(), "rc.1");
    }

    #[test]
    fn test_parse_version_rejects_wildcards_and_garbage() {
        for bad in ["", "x", "1.x", "1.2.x", "abc", "1..2", "1.2.3.4", "*"] {
            assert!(parse_version(bad).is_err(), "accepted '{bad}'");
        }
    }
}
