//! Keys and contiguous key ranges.

#[cfg(test)]
#[path = "tests/region.rs"]
mod tests;

use core::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A key in the table's key space, ordered lexicographically by bytes.
#[derive(
    Clone,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(from = "KeyRepr", into = "KeyRepr")]
pub struct StoreKey(Vec<u8>);

/// Keys are written as text when they are valid UTF-8 and as byte arrays otherwise.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum KeyRepr {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<KeyRepr> for StoreKey {
    fn from(repr: KeyRepr) -> Self {
        match repr {
            KeyRepr::Text(text) => Self(text.into_bytes()),
            KeyRepr::Bytes(bytes) => Self(bytes),
        }
    }
}

impl From<StoreKey> for KeyRepr {
    fn from(key: StoreKey) -> Self {
        match String::from_utf8(key.0) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Bytes(err.into_bytes()),
        }
    }
}

impl StoreKey {
    /// The smallest key.
    #[must_use]
    pub const fn min() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for StoreKey {
    fn from(key: &str) -> Self {
        Self(key.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for StoreKey {
    fn from(key: Vec<u8>) -> Self {
        Self(key)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "{text:?}"),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Exclusive upper edge of a key range. `Unbounded` sorts after every key.
#[derive(
    Clone,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RightBound {
    Key(StoreKey),
    Unbounded,
}

impl RightBound {
    /// Whether `key` lies strictly below this bound.
    #[must_use]
    pub fn is_above(&self, key: &StoreKey) -> bool {
        match self {
            Self::Key(bound) => key < bound,
            Self::Unbounded => true,
        }
    }

    #[must_use]
    pub const fn key(&self) -> Option<&StoreKey> {
        match self {
            Self::Key(key) => Some(key),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for RightBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => fmt::Display::fmt(key, f),
            Self::Unbounded => f.write_str("+inf"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegionError {
    #[error("empty key range [{left}, {right})")]
    Empty { left: StoreKey, right: RightBound },
}

/// A non-empty half-open key range `[left, right)`.
#[derive(
    Clone,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "RangeRepr")]
pub struct KeyRange {
    left: StoreKey,
    right: RightBound,
}

#[derive(Deserialize)]
struct RangeRepr {
    left: StoreKey,
    right: RightBound,
}

impl TryFrom<RangeRepr> for KeyRange {
    type Error = RegionError;

    fn try_from(repr: RangeRepr) -> Result<Self, Self::Error> {
        Self::new(repr.left, repr.right)
    }
}

impl KeyRange {
    pub fn new(left: StoreKey, right: RightBound) -> Result<Self, RegionError> {
        if !right.is_above(&left) {
            return Err(RegionError::Empty { left, right });
        }

        Ok(Self { left, right })
    }

    /// `[left, right)` with a finite right edge.
    pub fn bounded(
        left: impl Into<StoreKey>,
        right: impl Into<StoreKey>,
    ) -> Result<Self, RegionError> {
        Self::new(left.into(), RightBound::Key(right.into()))
    }

    /// `[left, +inf)`.
    #[must_use]
    pub fn from_key(left: impl Into<StoreKey>) -> Self {
        Self {
            left: left.into(),
            right: RightBound::Unbounded,
        }
    }

    /// The whole key space.
    #[must_use]
    pub const fn universe() -> Self {
        Self {
            left: StoreKey::min(),
            right: RightBound::Unbounded,
        }
    }

    #[must_use]
    pub const fn left(&self) -> &StoreKey {
        &self.left
    }

    #[must_use]
    pub const fn right(&self) -> &RightBound {
        &self.right
    }

    #[must_use]
    pub fn contains_key(&self, key: &StoreKey) -> bool {
        self.left <= *key && self.right.is_above(key)
    }

    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    /// Whether `next` starts exactly where this range ends.
    #[must_use]
    pub fn is_adjacent_to(&self, next: &Self) -> bool {
        self.right.key() == Some(&next.left)
    }

    /// The union of this range and the range directly after it.
    #[must_use]
    pub fn join(&self, next: &Self) -> Option<Self> {
        self.is_adjacent_to(next).then(|| Self {
            left: self.left.clone(),
            right: next.right.clone(),
        })
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.left, self.right)
    }
}
