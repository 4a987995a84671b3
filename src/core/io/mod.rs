//! Sequence input and PAF output.

pub mod fasta_reader;
pub mod paf_output;
pub mod sequence_source;

pub use fasta_reader::FastaParser;
pub use paf_output::{format_paf_record, format_paf_records};
pub use sequence_source::{Read, SequenceSource};
