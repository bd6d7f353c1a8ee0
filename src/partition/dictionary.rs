//! Dictionary-order combination generation.
//!
//! Enumerates every k-subset of `{1..=n}` in ascending lexicographic order.
//! The full sequence splits into `n - k + 1` contiguous segments keyed by the
//! smallest element, so segments can be generated independently and merged
//! into the canonically ordered result afterwards.

use crate::error::Result;
use crate::partition::ordered::{ExceptionSet, Partition};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Produce the lexicographic successor of a sorted k-tuple over `1..=n`.
///
/// Returns `None` once the final tuple `{n-k+1, .., n}` has been reached.
/// The input is never mutated; callers own the iteration state.
pub fn successor(current: &[u32], n: u32) -> Option<Vec<u32>> {
    let k = current.len();
    // Rightmost element still below its ceiling `n - distance_from_end`.
    for i in (0..k).rev() {
        let ceiling = n - (k - 1 - i) as u32;
        if current[i] < ceiling {
            let mut next = current.to_vec();
            next[i] += 1;
            for j in i + 1..k {
                next[j] = next[j - 1] + 1;
            }
            return Some(next);
        }
    }
    None
}

/// Generator for the full lexicographic sequence of k-subsets, filtered by
/// privacy exceptions.
pub struct DictionaryGenerator {
    n: u32,
    k: u32,
    privacy: ExceptionSet,
}

impl DictionaryGenerator {
    pub fn new(n: u32, k: u32, privacy: ExceptionSet) -> Self {
        debug_assert!(k >= 1 && k <= n);
        Self { n, k, privacy }
    }

    /// Enumerate all combinations, splitting across blocking workers when
    /// more than two processing units are available and `k < n`.
    pub async fn generate(&self) -> Result<BTreeSet<Partition>> {
        if processing_units() > 2 && self.k < self.n {
            self.generate_parallel().await
        } else {
            Ok(self.generate_serial())
        }
    }

    fn generate_serial(&self) -> BTreeSet<Partition> {
        let mut out = BTreeSet::new();
        let mut current: Vec<u32> = (1..=self.k).collect();
        loop {
            self.offer(&mut out, &current);
            match successor(&current, self.n) {
                Some(next) => current = next,
                None => break,
            }
        }
        debug!(n = self.n, k = self.k, generated = out.len(), "serial dictionary generation done");
        out
    }

    async fn generate_parallel(&self) -> Result<BTreeSet<Partition>> {
        let mut tasks = FuturesUnordered::new();
        // One segment per value of the first element; the last segment is the
        // single terminal combination and is added directly.
        for first in 1..=self.n - self.k {
            let (n, k) = (self.n, self.k);
            let privacy = self.privacy.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                generate_segment(n, k, first, &privacy)
            }));
        }

        let mut out = BTreeSet::new();
        let terminal = Partition::from_sorted((self.n - self.k + 1..=self.n).collect());
        if !self.privacy.matches(&terminal) {
            out.insert(terminal);
        }

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(segment) => out.extend(segment),
                Err(e) => {
                    warn!("dictionary segment worker failed: {e}");
                    return Err(crate::error::Error::Interrupted(format!(
                        "dictionary segment worker: {e}"
                    )));
                }
            }
        }
        debug!(n = self.n, k = self.k, generated = out.len(), "merged dictionary segments");
        Ok(out)
    }

    fn offer(&self, out: &mut BTreeSet<Partition>, tuple: &[u32]) {
        let candidate = Partition::from_sorted(tuple.to_vec());
        if !self.privacy.matches(&candidate) {
            out.insert(candidate);
        }
    }
}

/// Generate one contiguous segment: every combination whose smallest element
/// is `first`, in lexicographic order, minus privacy-exception supersets.
fn generate_segment(n: u32, k: u32, first: u32, privacy: &ExceptionSet) -> Vec<Partition> {
    let mut out = Vec::new();
    let mut current: Vec<u32> = (first..first + k).collect();
    loop {
        let candidate = Partition::from_sorted(current.clone());
        if !privacy.matches(&candidate) {
            out.push(candidate);
        }
        match successor(&current, n) {
            Some(next) if next[0] == first => current = next,
            _ => break,
        }
    }
    out
}

/// Pool sizing shared by the generators: one task per processing unit plus
/// one to cover blocking gaps.
pub(crate) fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
        + 1
}

/// Number of processing units, used to decide between serial and parallel
/// generation paths.
pub(crate) fn processing_units() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(attrs: &[u32]) -> Partition {
        Partition::new(attrs.to_vec()).unwrap()
    }

    #[test]
    fn successor_steps_through_lexicographic_order() {
        let seq = [
            vec![1, 2],
            vec![1, 3],
            vec![1, 4],
            vec![2, 3],
            vec![2, 4],
            vec![3, 4],
        ];
        let mut current = seq[0].clone();
        for expected in &seq[1..] {
            current = successor(&current, 4).unwrap();
            assert_eq!(&current, expected);
        }
        assert_eq!(successor(&current, 4), None);
    }

    #[test]
    fn successor_resets_trailing_elements() {
        assert_eq!(successor(&[1, 4, 5], 5), Some(vec![2, 3, 4]));
        assert_eq!(successor(&[2, 3, 5], 5), Some(vec![2, 4, 5]));
    }

    #[test]
    fn segment_covers_exactly_one_first_element() {
        let segment = generate_segment(5, 2, 2, &ExceptionSet::empty());
        assert_eq!(segment, vec![p(&[2, 3]), p(&[2, 4]), p(&[2, 5])]);
    }

    #[tokio::test]
    async fn generates_all_combinations_in_order() {
        let generated = DictionaryGenerator::new(4, 2, ExceptionSet::empty())
            .generate()
            .await
            .unwrap();
        let ordered: Vec<Partition> = generated.into_iter().collect();
        assert_eq!(
            ordered,
            vec![p(&[1, 2]), p(&[1, 3]), p(&[1, 4]), p(&[2, 3]), p(&[2, 4]), p(&[3, 4])]
        );
    }

    #[tokio::test]
    async fn privacy_exceptions_drop_supersets() {
        let privacy = ExceptionSet::new(vec![p(&[1])]);
        let generated = DictionaryGenerator::new(4, 2, privacy)
            .generate()
            .await
            .unwrap();
        let ordered: Vec<Partition> = generated.into_iter().collect();
        assert_eq!(ordered, vec![p(&[2, 3]), p(&[2, 4]), p(&[3, 4])]);
    }

    #[tokio::test]
    async fn k_equals_n_yields_single_combination() {
        let generated = DictionaryGenerator::new(3, 3, ExceptionSet::empty())
            .generate()
            .await
            .unwrap();
        assert_eq!(generated.len(), 1);
        assert!(generated.contains(&p(&[1, 2, 3])));
    }

    #[tokio::test]
    async fn count_matches_binomial_for_small_universes() {
        for n in 1..=8u32 {
            for k in 1..=n {
                let generated = DictionaryGenerator::new(n, k, ExceptionSet::empty())
                    .generate()
                    .await
                    .unwrap();
                let expected = crate::partition::orchestrator::binomial(n as u64, k as u64)
                    .unwrap();
                assert_eq!(generated.len() as u128, expected, "C({n},{k})");
                assert!(generated.iter().all(|part| part.len() as u32 == k));
            }
        }
    }
}
