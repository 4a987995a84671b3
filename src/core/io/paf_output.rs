//! PAF record formatting.
//!
//! One line per overlap with the twelve mandatory PAF columns. When the
//! overlap carries a base-level alignment its CIGAR is appended as a `cg:Z:`
//! tag. The residue-match column is estimated from the number of shared
//! minimizers (`num_residues * k`), capped at the alignment block length.

use std::fmt::Write as FmtWrite;

use super::sequence_source::SequenceSource;
use crate::error::Result;
use crate::overlap::Overlap;

/// Mapping quality column; overlaps carry no mapping quality.
const MAPQ_UNAVAILABLE: u8 = 255;

/// Append one PAF line for `overlap` to `out`.
pub fn format_paf_record(
    out: &mut String,
    overlap: &Overlap,
    cigar: Option<&str>,
    query_source: &dyn SequenceSource,
    target_source: &dyn SequenceSource,
    kmer_size: usize,
) -> Result<()> {
    let query = query_source.get_sequence_by_id(overlap.query_read_id)?;
    let target = target_source.get_sequence_by_id(overlap.target_read_id)?;

    let block_length = overlap.overlap_length();
    let residue_matches = (overlap.num_residues as u64 * kmer_size as u64).min(block_length as u64);

    // Writing to a String cannot fail
    let _ = write!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        query.name,
        query.len(),
        overlap.query_start,
        overlap.query_end,
        overlap.relative_strand.as_char(),
        target.name,
        target.len(),
        overlap.target_start,
        overlap.target_end,
        residue_matches,
        block_length,
        MAPQ_UNAVAILABLE
    );
    if let Some(cigar) = cigar.filter(|c| !c.is_empty()) {
        out.push_str("\tcg:Z:");
        out.push_str(cigar);
    }
    out.push('\n');
    Ok(())
}

/// Format all overlaps of one batch into a single buffer.
///
/// `cigars` is either empty or index-aligned with `overlaps`.
pub fn format_paf_records(
    overlaps: &[Overlap],
    cigars: &[String],
    query_source: &dyn SequenceSource,
    target_source: &dyn SequenceSource,
    kmer_size: usize,
) -> Result<String> {
    debug_assert!(cigars.is_empty() || cigars.len() == overlaps.len());

    let mut buffer = String::with_capacity(overlaps.len() * 96);
    for (i, overlap) in overlaps.iter().enumerate() {
        let cigar = cigars.get(i).map(String::as_str);
        format_paf_record(
            &mut buffer,
            overlap,
            cigar,
            query_source,
            target_source,
            kmer_size,
        )?;
    }
    Ok(buffer)
}
