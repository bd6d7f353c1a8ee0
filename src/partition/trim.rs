//! Budget trimming of generated partition sets.
//!
//! Retains exactly `floor(S * expense)` partitions. Supersets of a utility
//! exception are preferentially kept; removal walks the canonically ordered
//! sequence at evenly spaced positions so the surviving partitions cover the
//! whole lexicographic range instead of one end.

use crate::error::{Error, Result};
use crate::partition::ordered::{ExceptionSet, Partition};
use std::collections::BTreeSet;
use tracing::debug;

/// Trim `partitions` down to `floor(len * expense)` members.
///
/// Fails when the target rounds to zero. Must-keep partitions (supersets of a
/// utility exception) survive unless they alone exceed the target, in which
/// case they are decimated and the remainder is discarded entirely.
pub fn trim(
    partitions: BTreeSet<Partition>,
    expense: f64,
    utility: &ExceptionSet,
) -> Result<BTreeSet<Partition>> {
    if !(0.0..=1.0).contains(&expense) || expense <= 0.0 {
        return Err(Error::Config(format!(
            "expense must be in (0, 1], got {expense}"
        )));
    }
    let size = partitions.len();
    if size == 0 {
        return Ok(partitions);
    }
    let target = (size as f64 * expense).floor() as usize;
    if target == 0 {
        return Err(Error::Config(format!(
            "expense {expense} trims all {size} partitions; nothing left to explore"
        )));
    }
    if target == size {
        return Ok(partitions);
    }

    let (must_keep, remainder): (Vec<Partition>, Vec<Partition>) =
        partitions.into_iter().partition(|p| utility.matches(p));

    debug!(
        size,
        target,
        must_keep = must_keep.len(),
        "trimming partition set"
    );

    let kept = if must_keep.len() >= target {
        decimate(must_keep, target)
    } else {
        let from_remainder = target - must_keep.len();
        let mut kept = decimate(remainder, from_remainder);
        kept.extend(must_keep);
        kept
    };

    Ok(kept.into_iter().collect())
}

/// Keep exactly `keep` elements of an ordered sequence, removing the rest at
/// evenly spaced positions.
fn decimate(items: Vec<Partition>, keep: usize) -> Vec<Partition> {
    let len = items.len();
    if keep >= len {
        return items;
    }
    let remove = len - keep;
    // Removal positions r*len/remove are strictly increasing, so exactly
    // `remove` distinct elements are dropped.
    let mut doomed = (0..remove).map(|r| r * len / remove).peekable();
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            if doomed.peek() == Some(&i) {
                doomed.next();
                None
            } else {
                Some(item)
            }
        })
        .collect()
}
