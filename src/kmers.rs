//! K-mer extraction over sequence strings.
//!
//! Windows advance one character at a time and are keyed by exact substring
//! identity: case-sensitive, no reverse-complement canonicalization, every
//! character of the alphabet participates. Nucleotide and amino acid inputs
//! are treated the same way.

use std::collections::HashMap;

/// Fixed-length sliding-window counter.
pub struct KmerCounter {
    k: usize,
}

impl KmerCounter {
    pub fn new(k: usize) -> Self {
        KmerCounter { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Visits every length-k window of `sequence` in order.
    ///
    /// Window boundaries fall on character boundaries, so multi-byte input
    /// cannot produce torn slices. A sequence shorter than k yields nothing.
    pub fn for_each_window<'a, F>(&self, sequence: &'a str, mut visit: F)
    where
        F: FnMut(&'a str),
    {
        if self.k == 0 {
            return;
        }
        let bounds: Vec<usize> = sequence
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(sequence.len()))
            .collect();
        let n_chars = bounds.len() - 1;
        if n_chars < self.k {
            return;
        }
        for i in 0..=(n_chars - self.k) {
            visit(&sequence[bounds[i]..bounds[i + self.k]]);
        }
    }

    /// Counts every length-k window in `sequence`. Keys borrow from
    /// `sequence`, not from the counter.
    pub fn count<'a>(&self, sequence: &'a str) -> HashMap<&'a str, u32> {
        let mut counts = HashMap::new();
        self.for_each_window(sequence, |kmer| {
            *counts.entry(kmer).or_insert(0) += 1;
        });
        counts
    }
}
