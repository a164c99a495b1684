//! Labeled sequence collections.
//!
//! Sequences arrive keyed by identifier (FASTA header token). Insertion order
//! is preserved so downstream vocabularies stay reproducible run to run.

use indexmap::IndexMap;

use crate::error::{KmerizerError, Result};

/// Identifier -> sequence mapping with stable iteration order.
#[derive(Debug, Clone, Default)]
pub struct SequenceSet {
    records: IndexMap<String, String>,
}

impl SequenceSet {
    pub fn new() -> Self {
        SequenceSet {
            records: IndexMap::new(),
        }
    }

    /// Adds a sequence under its identifier. Duplicate identifiers are
    /// rejected rather than overwritten.
    pub fn insert(&mut self, id: &str, sequence: &str) -> Result<()> {
        if self.records.contains_key(id) {
            return Err(KmerizerError::DuplicateId(id.to_string()));
        }
        self.records.insert(id.to_string(), sequence.to_string());
        Ok(())
    }

    /// Builds a set from (identifier, sequence) pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut set = SequenceSet::new();
        for (id, seq) in pairs {
            set.insert(id.as_ref(), seq.as_ref())?;
        }
        Ok(set)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.records.get(id).map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|k| k.as_str())
    }

    /// (identifier, sequence) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
