//! Error types shared across the library.
//!
//! One enum covers the whole crate: builder validation failures, collaborator
//! failures (rarefaction depth, metadata collisions), and wrapped I/O errors.
//! The binary layers `anyhow` context on top of these.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmerizerError {
    /// Sequence set and abundance table share no identifiers. Raised before
    /// any k-mer extraction is attempted.
    #[error("No feature IDs match between the inputs.")]
    NoOverlap,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A sample cannot reach the requested rarefaction depth.
    #[error("sample '{sample}' has {available} observations, below the requested depth {requested}")]
    InsufficientDepth {
        sample: String,
        available: u64,
        requested: u64,
    },

    /// A metadata merge would overwrite an existing column.
    #[error("metadata column '{0}' already exists")]
    ColumnCollision(String),

    #[error("unknown feature ID '{0}'")]
    UnknownFeature(String),

    #[error("unknown metadata column '{0}'")]
    UnknownColumn(String),

    #[error("duplicate identifier '{0}'")]
    DuplicateId(String),

    #[error("table shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("malformed table: {0}")]
    TableFormat(String),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sequence parsing error: {0}")]
    SequenceParse(#[from] needletail::errors::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KmerizerError>;
