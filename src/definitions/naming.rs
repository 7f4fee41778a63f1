// src/definitions/naming.rs

//! Directory-name grammar for the definitions tree
//!
//! Versions are folded into path segments:
//! - `left-pad_v1.x.x` - package name + library version range
//! - `@babel` - npm scope directory holding scoped packages
//! - `flow_v0.104.x-`, `flow_v0.25.x-v0.103.x`, `flow_-v0.103.x`, `flow_all`
//!   - type checker version range
//!
//! Parsing happens once, while the index is built. Nothing downstream looks at
//! these strings again.

use crate::version::{RangeParseError, VersionRange};
use thiserror::Error;

/// Prefix of every tool-version directory
pub const TOOL_DIR_PREFIX: &str = "flow_";

/// Separator between a package name and its library version range
const VERSION_SEPARATOR: &str = "_v";

/// Errors from parsing a single path segment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("'{0}' is not a versioned package directory (expected <name>_v<range>)")]
    MissingVersionSuffix(String),

    #[error("invalid package name '{0}'")]
    InvalidName(String),

    #[error("invalid npm scope '{0}'")]
    InvalidScope(String),

    #[error("'{0}' is not a tool version directory (expected flow_<range>)")]
    NotToolDirectory(String),

    #[error("bad version range in '{segment}': {source}")]
    Range {
        segment: String,
        #[source]
        source: RangeParseError,
    },
}

/// A parsed `<name>_v<range>` segment
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSegment {
    pub name: String,
    pub library_range: VersionRange,
    /// The range text as written, e.g. `1.x.x`
    pub version_label: String,
}

/// A parsed `flow_<range>` segment
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSegment {
    pub tool_range: VersionRange,
    /// The whole directory name, e.g. `flow_v0.104.x-`
    pub label: String,
}

/// Check a package or environment name
///
/// Lowercase letters, digits, `-`, `.`, `_` and `~`; must not start with `.`
/// or `_`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(['.', '_'])
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_' | '~'))
}

/// Parse an `@scope` directory name, returning it with the `@`
pub fn parse_scope(segment: &str) -> Result<String, NamingError> {
    match segment.strip_prefix('@') {
        Some(scope) if is_valid_name(scope) => Ok(segment.to_string()),
        _ => Err(NamingError::InvalidScope(segment.to_string())),
    }
}

/// Parse a `<name>_v<range>` package directory name
pub fn parse_package_segment(segment: &str) -> Result<PackageSegment, NamingError> {
    let (name, version_label) = segment
        .rsplit_once(VERSION_SEPARATOR)
        .ok_or_else(|| NamingError::MissingVersionSuffix(segment.to_string()))?;

    if !is_valid_name(name) {
        return Err(NamingError::InvalidName(name.to_string()));
    }
    if version_label.is_empty() {
        return Err(NamingError::MissingVersionSuffix(segment.to_string()));
    }

    let library_range = VersionRange::parse(version_label).map_err(|source| NamingError::Range {
        segment: segment.to_string(),
        source,
    })?;

    Ok(PackageSegment {
        name: name.to_string(),
        library_range,
        version_label: version_label.to_string(),
    })
}

/// Parse a `flow_<range>` tool directory name
pub fn parse_tool_segment(segment: &str) -> Result<ToolSegment, NamingError> {
    let range_text = segment
        .strip_prefix(TOOL_DIR_PREFIX)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| NamingError::NotToolDirectory(segment.to_string()))?;

    let tool_range = VersionRange::parse(range_text).map_err(|source| NamingError::Range {
        segment: segment.to_string(),
        source,
    })?;

    Ok(ToolSegment {
        tool_range,
        label: segment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn test_package_segment() {
        let seg = parse_package_segment("left-pad_v1.x.x").unwrap();
        assert_eq!(seg.name, "left-pad");
        assert_eq!(seg.version_label, "1.x.x");
        assert!(seg.library_range.includes(&Version::new(1, 3, 0)));
        assert!(!seg.library_range.includes(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_package_segment_uses_last_separator() {
        let seg = parse_package_segment("foo_vue_v2.6.x").unwrap();
        assert_eq!(seg.name, "foo_vue");
        assert_eq!(seg.version_label, "2.6.x");
    }

    #[test]
    fn test_package_segment_errors() {
        assert!(matches!(
            parse_package_segment("left-pad"),
            Err(NamingError::MissingVersionSuffix(_))
        ));
        assert!(matches!(
            parse_package_segment("left-pad_v"),
            Err(NamingError::MissingVersionSuffix(_))
        ));
        assert!(matches!(
            parse_package_segment("Left-Pad_v1.x.x"),
            Err(NamingError::InvalidName(_))
        ));
        assert!(matches!(
            parse_package_segment("left-pad_vone"),
            Err(NamingError::Range { .. })
        ));
    }

    #[test]
    fn test_tool_segment_forms() {
        let open = parse_tool_segment("flow_v0.261.x-").unwrap();
        assert!(open.tool_range.includes(&Version::new(0, 300, 0)));
        assert!(!open.tool_range.includes(&Version::new(0, 260, 0)));
        assert_eq!(open.label, "flow_v0.261.x-");

        let bounded = parse_tool_segment("flow_v0.25.x-v0.103.x").unwrap();
        assert!(bounded.tool_range.includes(&Version::new(0, 103, 2)));
        assert!(!bounded.tool_range.includes(&Version::new(0, 104, 0)));

        let up_to = parse_tool_segment("flow_-v0.103.x").unwrap();
        assert!(up_to.tool_range.includes(&Version::new(0, 13, 0)));

        assert!(parse_tool_segment("flow_all").unwrap().tool_range.is_any());
    }

    #[test]
    fn test_tool_segment_errors() {
        assert!(matches!(
            parse_tool_segment("flow_"),
            Err(NamingError::NotToolDirectory(_))
        ));
        assert!(matches!(
            parse_tool_segment("ts_v4.x"),
            Err(NamingError::NotToolDirectory(_))
        ));
        assert!(matches!(
            parse_tool_segment("flow_v0.x.1-"),
            Err(NamingError::Range { .. })
        ));
    }

    #[test]
    fn test_scope() {
        assert_eq!(parse_scope("@babel").unwrap(), "@babel");
        assert!(parse_scope("babel").is_err());
        assert!(parse_scope("@").is_err());
        assert!(parse_scope("@Bad").is_err());
    }
}
