//! Near-duplicate suppression for extracted identifiers.
//!
//! OCR frequently reads the same physical identifier twice (overlapping
//! regions, repeated page headers) with a character or two of difference.
//! Candidates are compared with the Ratcliff/Obershelp "gestalt" ratio and a
//! candidate too similar to one already accepted is dropped.

use tracing::trace;

/// Threshold used unless configured otherwise.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.92;

/// A looser threshold for long identifiers or noisy scans.
pub const LENIENT_DUPLICATE_THRESHOLD: f64 = 0.88;

/// Similarity of two strings in `[0, 1]`: `2 * M / (|a| + |b|)`, where `M` is
/// the number of characters in matching blocks.
///
/// Matching blocks are found by taking the longest common block (earliest in
/// `a`, then earliest in `b` on ties) and recursing on both sides of it.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_block(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, size)`.
fn longest_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

    // run[j] = length of the common run ending at a[i - 1], b[j - 1]
    let mut prev = vec![0usize; bhi - blo + 1];
    let mut run = vec![0usize; bhi - blo + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo + 1;
            run[k] = if a[i] == b[j] { prev[k - 1] + 1 } else { 0 };
            if run[k] > best_size {
                best_size = run[k];
                best_i = i + 1 - best_size;
                best_j = j + 1 - best_size;
            }
        }
        std::mem::swap(&mut prev, &mut run);
    }

    (best_i, best_j, best_size)
}

/// Drops candidates that are near-duplicates of an earlier accepted one.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateFilter {
    threshold: f64,
}

impl DuplicateFilter {
    /// Create a filter with [`DEFAULT_DUPLICATE_THRESHOLD`].
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }

    /// Set the similarity at or above which a candidate counts as a duplicate.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether `candidate` duplicates any of `accepted`.
    pub fn is_duplicate<T: AsRef<str>>(&self, candidate: &str, accepted: &[T]) -> bool {
        accepted
            .iter()
            .any(|kept| similarity_ratio(candidate, kept.as_ref()) >= self.threshold)
    }

    /// Keep items in order, dropping each one too similar to an earlier keeper.
    pub fn filter<T, I>(&self, items: I) -> Vec<T>
    where
        T: AsRef<str>,
        I: IntoIterator<Item = T>,
    {
        let mut accepted: Vec<T> = Vec::new();
        for item in items {
            if self.is_duplicate(item.as_ref(), &accepted) {
                trace!("Dropping near-duplicate '{}'", item.as_ref());
                continue;
            }
            accepted.push(item);
        }
        accepted
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove near-duplicates from an ordered candidate list.
pub fn dedupe<S: AsRef<str>>(candidates: &[S], threshold: f64) -> Vec<String> {
    DuplicateFilter::new()
        .with_threshold(threshold)
        .filter(candidates.iter().map(|c| c.as_ref().to_string()))
}
