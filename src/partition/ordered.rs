//! Canonical partition value type and its total order.
//!
//! Partitions are compared by cardinality first, then lexicographically on
//! their ascending attribute indices. Every collection of partitions in the
//! crate (generated sets, exception sets, checkpoint replay) relies on this
//! one ordering so that merged parallel output is deterministic.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An immutable set of attribute indices drawn from the universe `1..=n`.
///
/// The indices are stored sorted ascending with no duplicates. Identity is
/// value equality of the set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition(Vec<u32>);

impl Partition {
    /// Build a partition from attribute indices, sorting and rejecting
    /// duplicates or indices outside `1..`.
    pub fn new(mut attributes: Vec<u32>) -> Result<Self> {
        if attributes.is_empty() {
            return Err(Error::Config("partition must not be empty".into()));
        }
        attributes.sort_unstable();
        if attributes[0] == 0 {
            return Err(Error::Config("attribute indices start at 1".into()));
        }
        if attributes.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::Config(format!(
                "duplicate attribute index in partition {attributes:?}"
            )));
        }
        Ok(Self(attributes))
    }

    /// Build from indices already known to be sorted, deduplicated, and >= 1.
    pub(crate) fn from_sorted(attributes: Vec<u32>) -> Self {
        debug_assert!(attributes.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(attributes.first().map_or(true, |&a| a >= 1));
        Self(attributes)
    }

    pub fn attributes(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, attribute: u32) -> bool {
        self.0.binary_search(&attribute).is_ok()
    }

    /// True when every attribute of `other` is present in `self`.
    pub fn is_superset_of(&self, other: &Partition) -> bool {
        if other.0.len() > self.0.len() {
            return false;
        }
        let mut mine = self.0.iter();
        'outer: for needle in &other.0 {
            for candidate in mine.by_ref() {
                match candidate.cmp(needle) {
                    Ordering::Equal => continue 'outer,
                    Ordering::Greater => return false,
                    Ordering::Less => {}
                }
            }
            return false;
        }
        true
    }
}

impl Ord for Partition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Partition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, attr) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{attr}")?;
        }
        write!(f, "}}")
    }
}

/// A collection of partitions used as privacy or utility exceptions.
///
/// A set "matches" a candidate partition when the candidate is a superset of
/// any member. Privacy exceptions exclude matching candidates; utility
/// exceptions mark them as preferentially retained during trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionSet(Vec<Partition>);

impl ExceptionSet {
    pub fn new(mut members: Vec<Partition>) -> Self {
        members.sort();
        members.dedup();
        Self(members)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn members(&self) -> &[Partition] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `candidate` is a superset of any member.
    pub fn matches(&self, candidate: &Partition) -> bool {
        self.0.iter().any(|e| candidate.is_superset_of(e))
    }

    /// Validate members against a plan: indices within `1..=n`, size <= k.
    pub fn validate(&self, n: u32, k: u32, role: &str) -> Result<()> {
        for member in &self.0 {
            if member.len() as u32 > k {
                return Err(Error::Config(format!(
                    "{role} exception {member} is larger than the partition size {k}"
                )));
            }
            if let Some(&max) = member.attributes().last() {
                if max > n {
                    return Err(Error::Config(format!(
                        "{role} exception {member} references attribute {max} outside 1..={n}"
                    )));
                }
            }
        }
        Ok(())
    }
}
