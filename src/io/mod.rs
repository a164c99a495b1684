//! Reading inputs and persisting pipeline artifacts.
//!
//! Sequences arrive as FASTA, tables and vectors travel as tab-separated
//! text, and ordination results serialize to JSON.

pub mod fasta;
pub mod table;

pub use fasta::load_sequences;
pub use table::{
    read_feature_table, write_alpha_vector, write_distance_matrix, write_feature_table,
    write_ordination,
};
