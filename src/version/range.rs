// src/version/range.rs

//! Version range expressions
//!
//! A range is a union of alternatives; each alternative is an intersection of
//! comparators. Every alternative reduces to a single half-open interval over
//! `(major, minor, patch)` triples, which is what `includes`, `intersects` and
//! specificity ordering work on.
//!
//! Accepted forms:
//! - `=1.2.3`, `>=1.2`, `<=1`, `>1.2.3`, `<2.0.0` - plain comparisons
//! - `~1.2.3` - same minor; `^1.2.3` - same major (same minor when major is 0)
//! - `1.2.3` - exact; `1.x.x`, `1.2`, `1.*` - x-ranges; `*`, `x`, `all` - anything
//! - `0.261.x-` - that version and every later one
//! - `0.25.x-v0.103.x`, `1.0 - 2.x` - hyphen ranges, upper end inclusive of the x-range
//! - `-v0.103.x` - everything up to and including the x-range
//! - `>=1.0.0 <2.0.0` - intersection; `1.x || >=3.0.0`, `1.x, 3.x` - union

use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Range parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("empty version range")]
    Empty,

    #[error("empty alternative in range '{0}'")]
    EmptyAlternative(String),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("operator '{op}' has no version in range '{range}'")]
    DanglingOperator { op: String, range: String },

    #[error("wildcard version not allowed in '{0}'")]
    WildcardOperand(String),

    #[error("range '{0}' can never be satisfied")]
    Unsatisfiable(String),
}

/// A `(major, minor, patch)` triple; prerelease and build metadata are ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Triple {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Triple {
    pub const ZERO: Triple = Triple::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The smallest triple strictly greater than this one
    fn successor(self) -> Self {
        Self::new(self.major, self.minor, self.patch.saturating_add(1))
    }
}

impl From<&Version> for Triple {
    fn from(v: &Version) -> Self {
        Self::new(v.major, v.minor, v.patch)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A version with optional components; `None` is a wildcard (`x`, `*`, or omitted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartialVersion {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
}

impl PartialVersion {
    /// Parse `1`, `1.2`, `1.2.3`, `1.x`, `v0.261.x`, `*`
    pub fn parse(text: &str) -> Result<Self, RangeParseError> {
        let body = text
            .strip_prefix('v')
            .or_else(|| text.strip_prefix('V'))
            .unwrap_or(text);

        let parts: Vec<&str> = body.split('.').collect();
        if body.is_empty() || parts.len() > 3 {
            return Err(RangeParseError::InvalidVersion(text.to_string()));
        }

        let mut components = [None; 3];
        let mut seen_wildcard = false;
        for (slot, part) in components.iter_mut().zip(parts.iter()) {
            if matches!(*part, "x" | "X" | "*") {
                seen_wildcard = true;
                continue;
            }
            // "1.x.3" has no meaning
            if seen_wildcard || part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(RangeParseError::InvalidVersion(text.to_string()));
            }
            *slot = Some(
                part.parse::<u64>()
                    .map_err(|_| RangeParseError::InvalidVersion(text.to_string()))?,
            );
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
        })
    }

    /// Whether every component is present
    pub fn is_complete(&self) -> bool {
        self.major.is_some() && self.minor.is_some() && self.patch.is_some()
    }

    /// Missing components filled with zero
    pub fn floor(&self) -> Triple {
        Triple::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        )
    }

    /// Upper end of this version read as an x-range
    fn x_range_upper(&self) -> Upper {
        match (self.major, self.minor, self.patch) {
            (None, _, _) => Upper::Unbounded,
            (Some(major), None, _) => Upper::Exclusive(Triple::new(major.saturating_add(1), 0, 0)),
            (Some(major), Some(minor), None) => {
                Upper::Exclusive(Triple::new(major, minor.saturating_add(1), 0))
            }
            (Some(major), Some(minor), Some(patch)) => {
                Upper::inclusive(Triple::new(major, minor, patch))
            }
        }
    }
}

impl fmt::Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |c: Option<u64>| c.map_or_else(|| "x".to_string(), |n| n.to_string());
        write!(
            f,
            "{}.{}.{}",
            show(self.major),
            show(self.minor),
            show(self.patch)
        )
    }
}

/// Comparator operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Exact match, or an x-range when components are missing
    Exact,
    GreaterEq,
    LessEq,
    Greater,
    Less,
    /// Same minor (same major when only the major is given)
    Tilde,
    /// Same major when major > 0 or the minor is a wildcard, otherwise same minor
    Caret,
    /// This version and every later one (the `x-` suffix)
    OpenAbove,
    /// Everything up to and including the x-range
    UpTo,
}

/// A single comparator clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Comparator {
    pub op: Operator,
    pub version: PartialVersion,
}

impl Comparator {
    fn new(op: Operator, version: PartialVersion) -> Self {
        Self { op, version }
    }

    /// The set of triples this comparator accepts
    fn interval(&self) -> Interval {
        let v = &self.version;
        let floor = v.floor();
        match self.op {
            Operator::Exact => Interval::new(floor, v.x_range_upper()),
            Operator::GreaterEq => Interval::new(floor, Upper::Unbounded),
            Operator::Greater => match v.x_range_upper() {
                Upper::Exclusive(above) => Interval::new(above, Upper::Unbounded),
                // Nothing lies above every version
                Upper::Unbounded => Interval::new(Triple::ZERO, Upper::Exclusive(Triple::ZERO)),
            },
            Operator::LessEq => Interval::new(Triple::ZERO, v.x_range_upper()),
            Operator::Less => Interval::new(Triple::ZERO, Upper::Exclusive(floor)),
            Operator::Tilde => {
                let upper = match v.minor {
                    Some(minor) => Triple::new(floor.major, minor.saturating_add(1), 0),
                    None => Triple::new(floor.major.saturating_add(1), 0, 0),
                };
                Interval::new(floor, Upper::Exclusive(upper))
            }
            Operator::Caret => {
                let upper = match v.minor {
                    Some(minor) if floor.major == 0 => Triple::new(0, minor.saturating_add(1), 0),
                    _ => Triple::new(floor.major.saturating_add(1), 0, 0),
                };
                Interval::new(floor, Upper::Exclusive(upper))
            }
            Operator::OpenAbove => Interval::new(floor, Upper::Unbounded),
            Operator::UpTo => Interval::new(Triple::ZERO, v.x_range_upper()),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.version;
        match self.op {
            Operator::Exact if v.major.is_none() => write!(f, "*"),
            Operator::Exact => write!(f, "{}", v),
            Operator::GreaterEq => write!(f, ">={}", v),
            Operator::LessEq => write!(f, "<={}", v),
            Operator::Greater => write!(f, ">{}", v),
            Operator::Less => write!(f, "<{}", v),
            Operator::Tilde => write!(f, "~{}", v),
            Operator::Caret => write!(f, "^{}", v),
            Operator::OpenAbove => write!(f, "{}-", v),
            Operator::UpTo => write!(f, "-{}", v),
        }
    }
}

/// Upper end of an interval
///
/// Inclusive ends are stored as the exclusive successor, so equal sets have
/// equal bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Upper {
    Exclusive(Triple),
    Unbounded,
}

impl Upper {
    fn inclusive(t: Triple) -> Self {
        Upper::Exclusive(t.successor())
    }

    fn admits(&self, t: Triple) -> bool {
        match self {
            Upper::Exclusive(u) => t < *u,
            Upper::Unbounded => true,
        }
    }
}

/// A contiguous set of triples: inclusive lower bound, flexible upper bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub lower: Triple,
    pub upper: Upper,
}

impl Interval {
    pub fn new(lower: Triple, upper: Upper) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded() -> Self {
        Self::new(Triple::ZERO, Upper::Unbounded)
    }

    pub fn contains(&self, t: Triple) -> bool {
        self.lower <= t && self.upper.admits(t)
    }

    pub fn is_empty(&self) -> bool {
        !self.upper.admits(self.lower)
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Merge when the two intervals overlap or touch
    fn merge(&self, other: &Interval) -> Option<Interval> {
        let (first, second) = if self.lower <= other.lower {
            (self, other)
        } else {
            (other, self)
        };
        let touches = match first.upper {
            Upper::Unbounded => true,
            Upper::Exclusive(edge) => second.lower <= edge,
        };
        touches.then(|| Interval::new(first.lower, first.upper.max(second.upper)))
    }

    /// How tightly this interval is bounded, for tie-breaking
    pub fn specificity(&self) -> Specificity {
        Specificity {
            upper: self.upper,
            lower: self.lower,
        }
    }
}

/// Ordering key for how narrow an interval is
///
/// Lower upper-bound first, then higher lower-bound. `Ordering::Less` means
/// narrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    upper: Upper,
    lower: Triple,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.upper
            .cmp(&other.upper)
            .then_with(|| other.lower.cmp(&self.lower))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed version range
#[derive(Debug, Clone)]
pub struct VersionRange {
    alternatives: Vec<Vec<Comparator>>,
    intervals: Vec<Interval>,
}

impl VersionRange {
    /// Parse range text; malformed or unsatisfiable text is rejected
    pub fn parse(text: &str) -> Result<Self, RangeParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RangeParseError::Empty);
        }

        let mut alternatives = Vec::new();
        let mut intervals = Vec::new();

        for alternative in trimmed.split("||").flat_map(|part| part.split(',')) {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(RangeParseError::EmptyAlternative(trimmed.to_string()));
            }

            let comparators = parse_alternative(alternative, trimmed)?;
            let interval = comparators
                .iter()
                .fold(Interval::unbounded(), |acc, c| acc.intersect(&c.interval()));
            if interval.is_empty() {
                return Err(RangeParseError::Unsatisfiable(alternative.to_string()));
            }

            alternatives.push(comparators);
            intervals.push(interval);
        }

        Ok(Self {
            alternatives,
            intervals,
        })
    }

    /// The range accepting every version
    pub fn any() -> Self {
        let wildcard = PartialVersion {
            major: None,
            minor: None,
            patch: None,
        };
        Self {
            alternatives: vec![vec![Comparator::new(Operator::Exact, wildcard)]],
            intervals: vec![Interval::unbounded()],
        }
    }

    /// Whether `version` satisfies this range
    pub fn includes(&self, version: &Version) -> bool {
        let t = Triple::from(version);
        self.intervals.iter().any(|i| i.contains(t))
    }

    /// Whether some version could satisfy both ranges
    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.intervals
            .iter()
            .any(|a| other.intervals.iter().any(|b| a.overlaps(b)))
    }

    /// Whether every version satisfies this range
    pub fn is_any(&self) -> bool {
        self.intervals.iter().any(|i| *i == Interval::unbounded())
    }

    /// Specificity of the narrowest alternative that accepts `version`
    pub fn specificity_for(&self, version: &Version) -> Option<Specificity> {
        let t = Triple::from(version);
        self.intervals
            .iter()
            .filter(|i| i.contains(t))
            .map(Interval::specificity)
            .min()
    }

    /// Comparator clauses, one group per alternative
    pub fn alternatives(&self) -> &[Vec<Comparator>] {
        &self.alternatives
    }

    /// Sorted, merged intervals; two ranges are equal when these are equal
    pub fn normalized(&self) -> Vec<Interval> {
        let mut sorted = self.intervals.clone();
        sorted.sort_by(|a, b| a.lower.cmp(&b.lower).then(a.upper.cmp(&b.upper)));

        let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
        for interval in sorted {
            if let Some(last) = merged.last_mut() {
                if let Some(m) = last.merge(&interval) {
                    *last = m;
                    continue;
                }
            }
            merged.push(interval);
        }
        merged
    }
}

/// Parse one alternative (whitespace-separated comparators)
fn parse_alternative(alternative: &str, range: &str) -> Result<Vec<Comparator>, RangeParseError> {
    const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "~", "^"];

    // Re-attach operators written with a space: ">= 1.2.3"
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for raw in alternative.split_whitespace() {
        if let Some(op) = pending_op.take() {
            tokens.push(format!("{op}{raw}"));
        } else if OPERATORS.contains(&raw) {
            pending_op = Some(raw);
        } else {
            tokens.push(raw.to_string());
        }
    }
    if let Some(op) = pending_op {
        return Err(RangeParseError::DanglingOperator {
            op: op.to_string(),
            range: range.to_string(),
        });
    }

    let mut comparators = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        // Spaced hyphen range: "1.0 - 2.x"
        if tokens.get(i + 1).map(String::as_str) == Some("-") {
            let upper = tokens
                .get(i + 2)
                .ok_or_else(|| RangeParseError::DanglingOperator {
                    op: "-".to_string(),
                    range: range.to_string(),
                })?;
            comparators.extend(hyphen_range(&tokens[i], upper)?);
            i += 3;
            continue;
        }
        comparators.extend(parse_token(&tokens[i])?);
        i += 1;
    }

    Ok(comparators)
}

fn hyphen_range(lower: &str, upper: &str) -> Result<[Comparator; 2], RangeParseError> {
    let low = require_major(PartialVersion::parse(lower)?, lower)?;
    let high = require_major(PartialVersion::parse(upper)?, upper)?;
    Ok([
        Comparator::new(Operator::GreaterEq, low),
        Comparator::new(Operator::UpTo, high),
    ])
}

fn require_major(v: PartialVersion, text: &str) -> Result<PartialVersion, RangeParseError> {
    if v.major.is_none() {
        return Err(RangeParseError::WildcardOperand(text.to_string()));
    }
    Ok(v)
}

/// Parse a single comparator token
fn parse_token(token: &str) -> Result<Vec<Comparator>, RangeParseError> {
    if matches!(token, "*" | "x" | "X" | "all") {
        return Ok(vec![Comparator::new(
            Operator::Exact,
            PartialVersion::parse("*")?,
        )]);
    }

    let prefixed = [
        (">=", Operator::GreaterEq),
        ("<=", Operator::LessEq),
        (">", Operator::Greater),
        ("<", Operator::Less),
        ("=", Operator::Exact),
        ("~", Operator::Tilde),
        ("^", Operator::Caret),
    ];
    for (prefix, op) in prefixed {
        if let Some(rest) = token.strip_prefix(prefix) {
            if rest.is_empty() {
                return Err(RangeParseError::DanglingOperator {
                    op: prefix.to_string(),
                    range: token.to_string(),
                });
            }
            let version = PartialVersion::parse(rest)?;
            let version = if op == Operator::Exact {
                version
            } else {
                require_major(version, token)?
            };
            return Ok(vec![Comparator::new(op, version)]);
        }
    }

    if let Some(rest) = token.strip_prefix('-') {
        let version = require_major(PartialVersion::parse(rest)?, token)?;
        return Ok(vec![Comparator::new(Operator::UpTo, version)]);
    }

    if let Some(rest) = token.strip_suffix('-') {
        let version = require_major(PartialVersion::parse(rest)?, token)?;
        return Ok(vec![Comparator::new(Operator::OpenAbove, version)]);
    }

    // Prerelease tags are not accepted, so an inner '-' is always a hyphen range
    if let Some((lower, upper)) = token.split_once('-') {
        if lower.is_empty() || upper.is_empty() {
            return Err(RangeParseError::InvalidVersion(token.to_string()));
        }
        return Ok(hyphen_range(lower, upper)?.to_vec());
    }

    Ok(vec![Comparator::new(
        Operator::Exact,
        PartialVersion::parse(token)?,
    )])
}

impl FromStr for VersionRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alternative) in self.alternatives.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            for (j, comparator) in alternative.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", comparator)?;
            }
        }
        Ok(())
    }
}
