// Copyright 2025 Molscript Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Selection sets
//!
//! A selection set is a bit-indexed set of domain-entity indices. It is the
//! value produced by selection expressions such as `{carbon and not water}`
//! and by inline literals such as `({0 2:5})`.

use std::fmt;

use roaring::RoaringBitmap;

/// A set of non-negative entity indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BitSet {
    bits: RoaringBitmap,
}

impl BitSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set containing `start..=end`
    pub fn from_range(start: u32, end: u32) -> Self {
        let mut bits = RoaringBitmap::new();
        if start <= end {
            bits.insert_range(start..=end);
        }
        Self { bits }
    }

    /// The set of all indices below `size`
    pub fn universe(size: u32) -> Self {
        let mut bits = RoaringBitmap::new();
        bits.insert_range(0..size);
        Self { bits }
    }

    #[inline]
    pub fn cardinality(&self) -> usize {
        self.bits.len() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        self.bits.contains(index)
    }

    #[inline]
    pub fn insert(&mut self, index: u32) -> bool {
        self.bits.insert(index)
    }

    #[inline]
    pub fn remove(&mut self, index: u32) -> bool {
        self.bits.remove(index)
    }

    /// Members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter()
    }

    /// Lowest member, if any
    pub fn first(&self) -> Option<u32> {
        self.bits.min()
    }

    pub fn and(&self, other: &BitSet) -> BitSet {
        Self {
            bits: &self.bits & &other.bits,
        }
    }

    pub fn or(&self, other: &BitSet) -> BitSet {
        Self {
            bits: &self.bits | &other.bits,
        }
    }

    pub fn xor(&self, other: &BitSet) -> BitSet {
        Self {
            bits: &self.bits ^ &other.bits,
        }
    }

    pub fn and_not(&self, other: &BitSet) -> BitSet {
        Self {
            bits: &self.bits - &other.bits,
        }
    }

    /// Complement relative to the universe `0..size`
    pub fn invert(&self, size: u32) -> BitSet {
        BitSet::universe(size).and_not(self)
    }

    /// Remove `other` when it is wholly contained, otherwise add it
    pub fn toggle(&self, other: &BitSet) -> BitSet {
        if other.bits.is_subset(&self.bits) {
            self.and_not(other)
        } else {
            self.or(other)
        }
    }

    /// Keep only the members at 1-based ordinal positions `first..=last`
    pub fn select_ordinals(&self, first: usize, last: usize) -> BitSet {
        let mut bits = RoaringBitmap::new();
        for (n, index) in self.bits.iter().enumerate() {
            let ordinal = n + 1;
            if ordinal > last {
                break;
            }
            if ordinal >= first {
                bits.insert(index);
            }
        }
        Self { bits }
    }

    /// Parse the escaped form `({0 2:5})`, `({null})` or the bare `{0 2:5}`
    pub fn parse(text: &str) -> Option<BitSet> {
        let text = text.trim();
        let inner = text
            .strip_prefix("({")
            .and_then(|s| s.strip_suffix("})"))
            .or_else(|| text.strip_prefix('{').and_then(|s| s.strip_suffix('}')))?;
        let inner = inner.trim();
        let mut set = BitSet::new();
        if inner.is_empty() || inner.eq_ignore_ascii_case("null") {
            return Some(set);
        }
        for item in inner.split_whitespace() {
            match item.split_once(':') {
                Some((a, b)) => {
                    let start: u32 = a.parse().ok()?;
                    let end: u32 = b.parse().ok()?;
                    if end < start {
                        return None;
                    }
                    set.bits.insert_range(start..=end);
                }
                None => {
                    set.bits.insert(item.parse().ok()?);
                }
            }
        }
        Some(set)
    }
}

impl FromIterator<u32> for BitSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({{")?;
        let mut iter = self.bits.iter().peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if end > start {
                write!(f, "{}:{}", start, end)?;
            } else {
                write!(f, "{}", start)?;
            }
        }
        write!(f, "}})")
    }
}
