//! Hierarchical gameplay tags.
//!
//! The engine treats tags as opaque values and only ever asks three things of
//! them: [`GameplayTag::is_valid`], equality, and
//! [`GameplayTag::matches_or_child_of`]. Parsing and inspection helpers exist
//! for hosts and content loaders.

use core::fmt;
use core::str::FromStr;

/// Segment separator of a tag path.
pub const SEPARATOR: char = '.';

/// A dotted hierarchical identifier such as `Combat.Damage.Fire`.
///
/// `Combat.Damage.Fire` is a child of `Combat.Damage`, which is a child of
/// `Combat`. The empty tag is invalid and matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct GameplayTag(String);

impl GameplayTag {
    /// Creates a tag from a dotted path. No validation happens here; an
    /// ill-formed path yields a tag for which [`is_valid`](Self::is_valid) is false.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The empty (invalid) tag.
    pub const fn none() -> Self {
        Self(String::new())
    }

    /// A tag is valid when it is non-empty and no segment is empty.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.split(SEPARATOR).all(|segment| !segment.is_empty())
    }

    /// True when `self` equals `other` or is a descendant of it.
    ///
    /// Both tags must be valid. `A.B` matches `A` but `A` does not match `A.B`,
    /// and `AB` does not match `A`.
    pub fn matches_or_child_of(&self, other: &GameplayTag) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        match self.0.strip_prefix(other.0.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// The immediate parent, or `None` for a root or invalid tag.
    pub fn parent(&self) -> Option<GameplayTag> {
        if !self.is_valid() {
            return None;
        }
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| GameplayTag::new(parent))
    }

    /// Number of segments; zero for an invalid tag.
    pub fn depth(&self) -> usize {
        if self.is_valid() {
            self.0.split(SEPARATOR).count()
        } else {
            0
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameplayTag {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.trim()))
    }
}

impl From<&str> for GameplayTag {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
