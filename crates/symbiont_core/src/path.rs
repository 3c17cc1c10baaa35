//! Dotted field paths.
//!
//! A field path such as `user.address.city` names a (possibly nested) field
//! of a payload. Paths are case-insensitive: every segment is lower-cased on
//! the way in, so `User.Address` and `user.address` are the same path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between path segments
pub const PATH_SEPARATOR: char = '.';

/// One lower-cased component of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSegment(String);

impl PathSegment {
    /// Create a segment, lower-casing the input
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathSegment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A tokenized field path
///
/// Parsing never fails. Input that is empty or has an empty segment
/// (`""`, `"a..b"`, `".a"`) yields the empty path, which every store
/// operation treats as a no-op or a miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Tokenize a dotted path string
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        let mut segments = Vec::new();
        for part in raw.split(PATH_SEPARATOR) {
            if part.is_empty() {
                return Self::default();
            }
            segments.push(PathSegment::new(part));
        }

        Self { segments }
    }

    /// Build from already-tokenized segments
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Segments from root to leaf
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Extend with one more segment
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Whether `self` is a strict ancestor of `other`
    #[must_use]
    pub fn is_strict_prefix_of(&self, other: &FieldPath) -> bool {
        self.len() < other.len() && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
