//! FASTA input.

use log::info;
use needletail::parse_fastx_file;
use std::path::Path;

use crate::error::Result;
use crate::sequences::SequenceSet;

/// Loads a sequence set from a FASTA file, compressed or plain.
///
/// The identifier is the first whitespace-delimited token of each header
/// line; the rest of the header is dropped. Duplicate identifiers are
/// rejected.
pub fn load_sequences(path: &Path) -> Result<SequenceSet> {
    let mut reader = parse_fastx_file(path)?;
    let mut set = SequenceSet::new();
    while let Some(record) = reader.next() {
        let record = record?;
        let header = String::from_utf8_lossy(record.id()).into_owned();
        let id = header.split_whitespace().next().unwrap_or_default();
        let sequence = String::from_utf8_lossy(&record.seq()).into_owned();
        set.insert(id, &sequence)?;
    }
    info!("loaded {} sequences from {}", set.len(), path.display());
    Ok(set)
}
