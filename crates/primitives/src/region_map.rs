//! Ordered mapping from disjoint sub-ranges of a domain to values.

#[cfg(test)]
#[path = "tests/region_map.rs"]
mod tests;

use core::fmt;
use core::ops::Bound;
use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::region::{KeyRange, RightBound, StoreKey};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegionMapError {
    #[error("region {region} is not inside domain {domain}")]
    OutOfDomain { region: KeyRange, domain: KeyRange },

    #[error("region {region} straddles a boundary at {boundary}")]
    NotHomogeneous { region: KeyRange, boundary: StoreKey },

    #[error("entries do not tile domain {domain}: gap or overlap at {at}")]
    Tiling { domain: KeyRange, at: StoreKey },

    #[error("entries end at {end} but domain {domain} ends at {}", domain.right())]
    Incomplete { domain: KeyRange, end: RightBound },
}

/// A total mapping from `domain` to values, stored as a sorted index keyed by the
/// left edge of each entry. Every entry extends up to the next entry's left edge
/// or to the right edge of the domain.
#[derive(Clone, PartialEq, Eq)]
pub struct RegionMap<V> {
    domain: KeyRange,
    entries: BTreeMap<StoreKey, V>,
}

impl<V> RegionMap<V> {
    /// A map assigning `value` to the whole of `domain`.
    #[must_use]
    pub fn new(domain: KeyRange, value: V) -> Self {
        let mut entries = BTreeMap::new();
        drop(entries.insert(domain.left().clone(), value));

        Self { domain, entries }
    }

    /// Builds a map from entries which must tile `domain` in key order.
    pub fn from_entries<I>(domain: KeyRange, entries: I) -> Result<Self, RegionMapError>
    where
        I: IntoIterator<Item = (KeyRange, V)>,
    {
        let mut map = BTreeMap::new();
        let mut expected = RightBound::Key(domain.left().clone());

        for (region, value) in entries {
            if expected.key() != Some(region.left()) {
                return Err(RegionMapError::Tiling {
                    domain,
                    at: region.left().clone(),
                });
            }

            expected = region.right().clone();
            drop(map.insert(region.left().clone(), value));
        }

        if &expected != domain.right() {
            return Err(RegionMapError::Incomplete {
                domain,
                end: expected,
            });
        }

        Ok(Self {
            domain,
            entries: map,
        })
    }

    #[must_use]
    pub const fn domain(&self) -> &KeyRange {
        &self.domain
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Left edges of all entries, in key order.
    pub fn boundaries(&self) -> impl Iterator<Item = &StoreKey> + '_ {
        self.entries.keys()
    }

    /// Entries in key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            domain: &self.domain,
            inner: self.entries.iter().peekable(),
        }
    }

    /// The value of the unique entry covering `region`.
    pub fn lookup(&self, region: &KeyRange) -> Result<&V, RegionMapError> {
        let (range, value) = self.entry_containing(region)?;

        if region.right() > range.right() {
            let boundary = range.right().key().cloned().unwrap_or_default();
            return Err(RegionMapError::NotHomogeneous {
                region: region.clone(),
                boundary,
            });
        }

        Ok(value)
    }

    fn entry_containing(&self, region: &KeyRange) -> Result<(KeyRange, &V), RegionMapError> {
        if !self.domain.is_superset(region) {
            return Err(RegionMapError::OutOfDomain {
                region: region.clone(),
                domain: self.domain.clone(),
            });
        }

        let (left, value) = self
            .entries
            .range(..=region.left().clone())
            .next_back()
            .ok_or_else(|| RegionMapError::OutOfDomain {
                region: region.clone(),
                domain: self.domain.clone(),
            })?;

        let right = match self
            .entries
            .range((Bound::Excluded(left.clone()), Bound::Unbounded))
            .next()
        {
            Some((key, _)) => RightBound::Key(key.clone()),
            None => self.domain.right().clone(),
        };

        let range = KeyRange::new(left.clone(), right).map_err(|_| RegionMapError::Tiling {
            domain: self.domain.clone(),
            at: left.clone(),
        })?;

        Ok((range, value))
    }
}

/// Iterator over the entries of a [`RegionMap`] as `(range, value)` pairs.
#[derive(Debug)]
pub struct Iter<'a, V> {
    domain: &'a KeyRange,
    inner: core::iter::Peekable<btree_map::Iter<'a, StoreKey, V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (KeyRange, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (left, value) = self.inner.next()?;
        let right = match self.inner.peek() {
            Some((next, _)) => RightBound::Key((*next).clone()),
            None => self.domain.right().clone(),
        };

        KeyRange::new(left.clone(), right)
            .ok()
            .map(|range| (range, value))
    }
}

impl<'a, V> IntoIterator for &'a RegionMap<V> {
    type Item = (KeyRange, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: fmt::Debug> fmt::Debug for RegionMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[derive(Serialize)]
struct RegionMapRef<'a, V> {
    domain: &'a KeyRange,
    entries: Vec<(KeyRange, &'a V)>,
}

#[derive(Deserialize)]
struct RegionMapOwned<V> {
    domain: KeyRange,
    entries: Vec<(KeyRange, V)>,
}

impl<V: Serialize> Serialize for RegionMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RegionMapRef {
            domain: &self.domain,
            entries: self.iter().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for RegionMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let owned = RegionMapOwned::<V>::deserialize(deserializer)?;

        Self::from_entries(owned.domain, owned.entries).map_err(serde::de::Error::custom)
    }
}
