//! Base-level alignment of overlaps: CIGAR handling, the global alignment
//! kernel and the batched engine interface built on it.

pub mod cigar;
pub mod engine;
pub mod global;

pub use engine::{
    Aligner, AlignerFactory, AlignmentStatus, AlignmentType, CpuAligner, CpuAlignerFactory,
    alignment_cost_bytes,
};
pub use global::{GlobalAlignment, align_global};
