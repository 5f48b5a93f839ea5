//! # Combinatorial Helpers
//!
//! Size-`k` subset enumeration and the union-product used to conjoin
//! candidate sets.

use crate::domain::{CandidateSet, Group, SelectionError};

/// Iterator over every size-`k` subset of `0..n`, in lexicographic order.
///
/// Yields C(n, k) index vectors; nothing when `k > n`.
#[derive(Debug, Clone)]
pub struct Subsets {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Subsets {
    pub fn new(n: usize, k: usize) -> Self {
        let current = (k <= n).then(|| (0..k).collect());
        Self { n, current }
    }
}

impl Iterator for Subsets {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let subset = self.current.take()?;
        let k = subset.len();

        // Advance: rightmost index that can still move right
        let mut next = subset.clone();
        let mut pos = k;
        while pos > 0 {
            pos -= 1;
            if next[pos] < self.n - k + pos {
                next[pos] += 1;
                for later in pos + 1..k {
                    next[later] = next[later - 1] + 1;
                }
                self.current = Some(next);
                break;
            }
        }

        Some(subset)
    }
}

/// Binomial coefficient, saturating at `usize::MAX`
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: usize = 1;
    for i in 0..k {
        result = match result.checked_mul(n - i) {
            Some(product) => product / (i + 1),
            None => return usize::MAX,
        };
    }
    result
}

/// Cartesian product of candidate sets, each tuple unioned into one group.
///
/// Results go into `out` (which deduplicates). `generated` counts every
/// produced union across calls and is checked against `limit`.
pub fn union_product(
    sets: &[&CandidateSet],
    out: &mut CandidateSet,
    generated: &mut usize,
    limit: usize,
) -> Result<(), SelectionError> {
    if sets.is_empty() || sets.iter().any(|s| s.is_empty()) {
        return Ok(());
    }

    let mut odometer = vec![0usize; sets.len()];
    loop {
        *generated += 1;
        if *generated > limit {
            return Err(SelectionError::TooManyCandidateGroups { limit });
        }

        out.insert(union_at(sets, &odometer));

        let mut pos = sets.len();
        loop {
            if pos == 0 {
                return Ok(());
            }
            pos -= 1;
            odometer[pos] += 1;
            if odometer[pos] < sets[pos].len() {
                break;
            }
            odometer[pos] = 0;
        }
    }
}

fn union_at(sets: &[&CandidateSet], odometer: &[usize]) -> Group {
    let mut picks = sets
        .iter()
        .zip(odometer)
        .map(|(set, &i)| &set.groups()[i]);
    // sets is non-empty, checked by the caller
    let first = picks.next().cloned().unwrap_or(Group::Composite(Vec::new()));
    picks.fold(first, |acc, group| acc.union(group))
}
